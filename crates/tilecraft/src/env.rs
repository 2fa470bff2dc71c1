use std::env;
use std::sync::OnceLock;

static PRINT_IR_AFTER_ALL: OnceLock<bool> = OnceLock::new();
static N_ITERS: OnceLock<Option<usize>> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// `TILECRAFT_PRINT_IR_AFTER_ALL` forces IR printing on every compile request.
pub(crate) fn print_ir_after_all() -> bool {
    *PRINT_IR_AFTER_ALL.get_or_init(|| match env::var("TILECRAFT_PRINT_IR_AFTER_ALL") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

/// `TILECRAFT_N_ITERS`, for callers without an explicit iteration count.
pub fn n_iters_override() -> Option<usize> {
    *N_ITERS.get_or_init(|| {
        env::var("TILECRAFT_N_ITERS")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
    })
}

/// External compiler named by `TILECRAFT_COMPILER`, if any.
pub fn compiler_program() -> Option<String> {
    env::var("TILECRAFT_COMPILER")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
