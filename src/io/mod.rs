pub mod convert;
pub mod locs;
pub mod sites;
pub mod table;

pub use self::convert::{convert, ConvertOptions, Converted};
pub use self::locs::{parse_locs, read_locs, write_locs};
pub use self::sites::{parse_sites, read_sites, write_freqs, write_sites, SitesFile};
pub use self::table::{read_table, write_table};
