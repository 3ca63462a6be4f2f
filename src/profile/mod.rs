//! Profile co-layers riding on top of the network layer (`spec.md` §4.5-§4.8).

pub mod gdp;
pub mod zid;
