pub mod core {
    pub mod driver;
    pub mod edits;
    pub mod events;
    pub mod handle_history;
    pub mod lap;
    pub mod positions;
    pub mod race_history;
    pub mod stint;

    #[cfg(test)]
    pub(crate) mod fixtures;
}
pub mod interfaces {
    pub mod panel_interface;
}
pub mod post {
    pub mod history_result;
    pub mod snapshot;
}
pub mod pre {
    pub mod hist_opts;
    pub mod read_history_pars;
    pub mod read_raw_laps;
}
