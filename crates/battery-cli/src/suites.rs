//! Built-in demonstration suites so the binary is runnable out of the box.
//!
//! These are small seeded property checks over the workspace's own helpers
//! and standard-library behavior; real deployments register their own suites
//! through [`battery_runner::Suite`].

use anyhow::ensure;
use battery_core::{append_line, atomic_write_bytes, short_id};
use battery_runner::{Case, CaseContext, Suite};
use rand::Rng;
use std::fs;

fn atomic_write_roundtrip(ctx: &mut CaseContext) -> anyhow::Result<()> {
    let len = ctx.rng.gen_range(0..4096);
    let payload: Vec<u8> = (&mut ctx.rng).sample_iter(rand::distributions::Standard).take(len).collect();
    let target = ctx.sandbox.join("roundtrip.bin");
    atomic_write_bytes(&target, &payload)?;
    let read_back = fs::read(&target)?;
    ensure!(read_back == payload, "read back {} bytes, wrote {}", read_back.len(), payload.len());
    Ok(())
}

fn append_preserves_order(ctx: &mut CaseContext) -> anyhow::Result<()> {
    let log = ctx.sandbox.join("ordered.log");
    // The sandbox is normally fresh per attempt; tolerate reuse anyway.
    let _ = fs::remove_file(&log);
    let count = ctx.rng.gen_range(1..64);
    let lines: Vec<String> = (0..count)
        .map(|i| format!("line {} token {}", i, ctx.rng.gen::<u32>()))
        .collect();
    for line in &lines {
        append_line(&log, line)?;
    }
    let written: Vec<String> = fs::read_to_string(&log)?.lines().map(String::from).collect();
    ensure!(written == lines, "log order diverged after {} appends", count);
    Ok(())
}

fn short_id_shape(ctx: &mut CaseContext) -> anyhow::Result<()> {
    let len = ctx.rng.gen_range(1..16);
    let id = short_id(&mut ctx.rng, len);
    ensure!(id.len() == len, "id '{}' has length {}, wanted {}", id, id.len(), len);
    ensure!(id.chars().all(|c| c.is_ascii_alphanumeric()), "id '{}' not alphanumeric", id);
    Ok(())
}

fn sort_is_idempotent(ctx: &mut CaseContext) -> anyhow::Result<()> {
    let len = ctx.rng.gen_range(0..512);
    let mut values: Vec<i64> = (0..len).map(|_| ctx.rng.gen()).collect();
    values.sort_unstable();
    let once = values.clone();
    values.sort_unstable();
    ensure!(values == once, "second sort changed a sorted vector");
    Ok(())
}

fn sort_preserves_elements(ctx: &mut CaseContext) -> anyhow::Result<()> {
    let len = ctx.rng.gen_range(0..512);
    let original: Vec<u8> = (0..len).map(|_| ctx.rng.gen()).collect();
    let mut sorted = original.clone();
    sorted.sort_unstable();
    let mut histogram = [0i64; 256];
    for b in &original {
        histogram[*b as usize] += 1;
    }
    for b in &sorted {
        histogram[*b as usize] -= 1;
    }
    ensure!(histogram.iter().all(|&n| n == 0), "sort changed the multiset");
    Ok(())
}

fn reverse_is_involutive(ctx: &mut CaseContext) -> anyhow::Result<()> {
    let len = ctx.rng.gen_range(0..256);
    let original: Vec<u16> = (0..len).map(|_| ctx.rng.gen()).collect();
    let mut twice = original.clone();
    twice.reverse();
    twice.reverse();
    ensure!(twice == original, "double reverse changed the vector");
    Ok(())
}

pub fn builtin() -> Vec<Suite> {
    vec![
        Suite {
            name: "core_fs",
            cases: vec![
                Case {
                    name: "atomic_write_roundtrip",
                    run: atomic_write_roundtrip,
                },
                Case {
                    name: "append_preserves_order",
                    run: append_preserves_order,
                },
                Case {
                    name: "short_id_shape",
                    run: short_id_shape,
                },
            ],
        },
        Suite {
            name: "stdlib_props",
            cases: vec![
                Case {
                    name: "sort_is_idempotent",
                    run: sort_is_idempotent,
                },
                Case {
                    name: "sort_preserves_elements",
                    run: sort_preserves_elements,
                },
                Case {
                    name: "reverse_is_involutive",
                    run: reverse_is_involutive,
                },
            ],
        },
    ]
}
