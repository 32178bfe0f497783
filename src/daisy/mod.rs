//! DAISY markup parsers: SMIL documents and the spine sources (NCC, OPF).

mod ncc;
mod opf;
mod smil;

pub use ncc::parse_ncc_spine;
pub use opf::parse_opf_spine;
pub use smil::parse_smil;
