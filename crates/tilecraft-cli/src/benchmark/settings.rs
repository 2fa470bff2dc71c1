/// Iteration count for a sweep: an explicit flag beats the environment, which
/// beats the configuration.
pub fn resolve_n_iters(flag: Option<usize>, env: Option<usize>, configured: usize) -> usize {
    flag.or(env).unwrap_or(configured)
}
