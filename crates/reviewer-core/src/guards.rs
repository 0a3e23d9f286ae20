//! Shared guardrails for worker counts and traversal limits.

pub const DEFAULT_WORKERS: usize = 4;
pub const MAX_WORKERS: usize = 64;

// Attribute chains such as `a.b.c.d()` are walked at most this deep.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 32;
pub const MAX_CHAIN_DEPTH: usize = 256;

// Statement nesting beyond this is not descended into.
pub const MAX_AST_DEPTH: usize = 512;

pub fn clamp_int(value: i64, minimum: i64, maximum: i64) -> i64 {
    value.max(minimum).min(maximum)
}

pub fn clamp_workers(value: usize) -> usize {
    clamp_int(value as i64, 1, MAX_WORKERS as i64) as usize
}

pub fn clamp_chain_depth(value: usize) -> usize {
    clamp_int(value as i64, 1, MAX_CHAIN_DEPTH as i64) as usize
}
