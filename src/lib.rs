pub mod days_rest;
pub mod error;
pub mod match_dataset;
pub mod match_outcome;
pub mod model_table;
pub mod rolling_form;
pub mod team_rows;
pub mod team_strength;
pub mod xg_model;
