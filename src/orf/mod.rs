mod coding_potential;
mod find;
mod kozak;
mod select;

pub use coding_potential::{fickett_score, HexamerTable};
pub use find::{find_orfs, OrfCandidate};
pub use kozak::KozakMatrix;
pub use select::{build_orf, select_orf, OrfParams, SelectedOrf, NMD_JUNCTION_DIST};
