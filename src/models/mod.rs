mod eight_schools;
mod scale;

pub use eight_schools::{
    eight_schools, eight_schools_noncentered, EightSchools, Parameterization, EIGHT_SCHOOLS_J,
    EIGHT_SCHOOLS_SIGMA, EIGHT_SCHOOLS_Y,
};
pub use scale::{conditioned_scale, ConditionedScale, DEFAULT_GUESS};
