// chemistry module
pub mod chemistry {
    pub mod transformations;
}

// data module
pub mod data {
    pub mod feature;
    pub mod adjacency;
}

// algorithm module
pub mod algorithm {
    pub mod structural;
    pub mod rt_correction;
    pub mod statistical;
    pub mod combine;
}

pub mod error;
