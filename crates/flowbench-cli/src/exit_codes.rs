//! Process exit codes. Part of the public contract.

pub const SUCCESS: i32 = 0;
pub const FLOW_FAILED: i32 = 1; // At least one flow ended in `failed`
pub const CONFIG_ERROR: i32 = 2; // Bad config, unreadable input or unwritable output
