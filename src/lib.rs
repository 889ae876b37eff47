pub mod core {
    pub mod config;
    pub mod error;
    pub mod gate;
    pub mod registry;
    pub mod runner;
    pub mod test;
}

pub mod reporters;
