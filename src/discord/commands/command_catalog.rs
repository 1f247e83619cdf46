// Discord commands module.
// Each feature gets its own command file.

pub mod nomi;

// Bot presence management
pub mod presence;
