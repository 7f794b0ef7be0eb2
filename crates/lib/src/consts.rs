/// Application name, used for the default directory layout.
pub const APP_NAME: &str = "stockpot";
