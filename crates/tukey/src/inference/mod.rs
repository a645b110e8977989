//! Column type inference for raw delimited input.

mod column_type;

pub use column_type::{TypeInference, TypeInferrer};
