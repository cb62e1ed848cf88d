use super::HandlerTables;

/// Linux runs the runtime natively; only the shared handlers apply.
pub fn tables() -> HandlerTables {
    HandlerTables::shared()
}
