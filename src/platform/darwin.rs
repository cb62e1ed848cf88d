//! macOS: commands run in the Lima VM; the shared handlers cover mounts,
//! host entries and environment forwarding.

use super::HandlerTables;

pub fn tables() -> HandlerTables {
    HandlerTables::shared()
}
