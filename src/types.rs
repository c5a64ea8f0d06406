//! Public and internal types for the zdb-index API and pipeline.

/// Metadata for one dnode, keyed by object id. Mandatory fields come from the
/// lead-in row under the column header and never change once set; optional
/// fields are filled in from the tab-indented lines of the record's span (and
/// by the path-enrichment pass).
///
/// The size columns (`iblk`, `dblk`, `dsize`, `lsize`) are kept as the exact
/// text zdb printed (`512`, `128K`, `1.50M`); decoding them would invent
/// precision the tool never emitted. `mode` and `pflags` stay verbatim for the
/// same reason (octal/hex spellings).
#[derive(Clone, Debug, PartialEq)]
pub struct DnodeRecord {
    pub object_id: u64,
    pub lvl: u64,
    pub iblk: String,
    pub dblk: String,
    pub dsize: String,
    pub dnsize: String,
    pub lsize: String,
    pub pct_full: f64,
    pub obj_type: String,

    pub flags: Option<String>,
    pub maxblkid: Option<u64>,
    /// Raw bytes: paths are not guaranteed valid UTF-8.
    pub path: Option<Vec<u8>>,
    pub uid: Option<u64>,
    pub gid: Option<u64>,
    pub atime: Option<String>,
    pub mtime: Option<String>,
    pub ctime: Option<String>,
    pub crtime: Option<String>,
    pub r#gen: Option<u64>,
    pub mode: Option<String>,
    pub size: Option<u64>,
    pub parent: Option<u64>,
    pub links: Option<u64>,
    pub pflags: Option<String>,
}

impl DnodeRecord {
    /// Build a record with only the mandatory fields set.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        object_id: u64,
        lvl: u64,
        iblk: String,
        dblk: String,
        dsize: String,
        dnsize: String,
        lsize: String,
        pct_full: f64,
        obj_type: String,
    ) -> Self {
        Self {
            object_id,
            lvl,
            iblk,
            dblk,
            dsize,
            dnsize,
            lsize,
            pct_full,
            obj_type,
            flags: None,
            maxblkid: None,
            path: None,
            uid: None,
            gid: None,
            atime: None,
            mtime: None,
            ctime: None,
            crtime: None,
            r#gen: None,
            mode: None,
            size: None,
            parent: None,
            links: None,
            pflags: None,
        }
    }

    /// True when the two records agree on every mandatory field.
    /// Used by enrichment to verify a re-emitted lead-in row.
    pub fn mandatory_eq(&self, other: &DnodeRecord) -> bool {
        self.object_id == other.object_id
            && self.lvl == other.lvl
            && self.iblk == other.iblk
            && self.dblk == other.dblk
            && self.dsize == other.dsize
            && self.dnsize == other.dnsize
            && self.lsize == other.lsize
            && self.pct_full == other.pct_full
            && self.obj_type == other.obj_type
    }

    /// True when the type label marks a plain file (the only records the
    /// path-enrichment pass asks zdb about).
    pub fn is_plain_file(&self) -> bool {
        self.obj_type.contains("plain file")
    }
}

/// One extracted optional field with its converted value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Flags(String),
    MaxBlkId(u64),
    Path(Vec<u8>),
    Uid(u64),
    Gid(u64),
    Atime(String),
    Mtime(String),
    Ctime(String),
    Crtime(String),
    Gen(u64),
    Mode(String),
    Size(u64),
    Parent(u64),
    Links(u64),
    Pflags(String),
}

impl FieldValue {
    /// Stable field name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldValue::Flags(_) => "flags",
            FieldValue::MaxBlkId(_) => "maxblkid",
            FieldValue::Path(_) => "path",
            FieldValue::Uid(_) => "uid",
            FieldValue::Gid(_) => "gid",
            FieldValue::Atime(_) => "atime",
            FieldValue::Mtime(_) => "mtime",
            FieldValue::Ctime(_) => "ctime",
            FieldValue::Crtime(_) => "crtime",
            FieldValue::Gen(_) => "gen",
            FieldValue::Mode(_) => "mode",
            FieldValue::Size(_) => "size",
            FieldValue::Parent(_) => "parent",
            FieldValue::Links(_) => "links",
            FieldValue::Pflags(_) => "pflags",
        }
    }
}

/// Scan options shared by the CLI handlers and the orchestrator.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Index database path. When None, uses `~/.zdb-index/<dataset>.db`.
    pub db_path: Option<std::path::PathBuf>,
    /// Show the records/sec status counter on stderr.
    pub status: bool,
    /// Stop either phase after this many finalized records (testing only).
    pub exit_early: Option<u64>,
    /// Skip the path-enrichment pass (structural pass only).
    pub skip_paths: bool,
    /// Object ids per phase-2 zdb invocation. Bounds argv length.
    pub batch_size: Option<usize>,
    /// Parent ids to watch: matching `object_id parent_id` pairs are printed
    /// to stdout as they stream by.
    pub watch_parents: Vec<u64>,
}
