//! CCD reduction: frame classification, overscan and trim corrections,
//! master bias/flat construction, and the night-level flow behind `redccd`.

mod classify;
mod combine;
mod masters;
mod night;
mod overscan;

pub use classify::{classify, InstrumentSetup, NightLog, ObsType, SetupGroup};
pub use combine::{combine, CombineMethod};
pub use masters::{
    create_master_bias, create_master_flat, divide_flat, subtract_bias, Normalize,
};
pub use night::reduce_night;
pub use overscan::{overscan_stats, subtract_overscan, trim, OverscanStats};
