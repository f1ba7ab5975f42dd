pub mod session {

    /// Username of the logged-in user.
    pub const USER: &str = "user";

    /// Key into the process-wide OAuth relay store.
    pub const RELAY_KEY: &str = "relay_key";

    /// One-shot messages shown on the next rendered page.
    pub const FLASHES: &str = "_flashes";
}

pub mod intervals {
    use std::time::Duration;

    pub const THROTTLE_PRUNE: Duration = Duration::from_secs(60);
}
