//! Helpers for engines that run as an external process
//!
//! Samples are written to the child's stdin as little-endian float32 and
//! the child answers with JSON on stdout. One process per call.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

/// Convert samples to little-endian bytes for stdin
pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut buf = vec![0u8; samples.len() * 4];
    for (i, &sample) in samples.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&sample.to_le_bytes());
    }
    buf
}

/// Spawn `program`, stream `samples` into it and return its stdout.
///
/// Stdin is fed from a separate thread while stdout and stderr are drained,
/// so a chatty child cannot block on a full pipe. A child that exits without
/// reading all samples is reported through its exit status and stderr.
pub fn run_with_samples(
    program: &Path,
    args: &[String],
    envs: &[(&str, &str)],
    samples: &[f32],
) -> Result<Vec<u8>> {
    let mut child = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start {:?}", program))?;

    let mut stdin = child.stdin.take().context("Failed to get stdin")?;
    let bytes = samples_to_bytes(samples);
    let writer = thread::spawn(move || stdin.write_all(&bytes));

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to wait for {:?}", program))?;

    let write_result = writer
        .join()
        .map_err(|_| anyhow::anyhow!("Sample writer thread panicked"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!("{:?} failed ({}): {}", program, output.status, stderr.trim());
        anyhow::bail!("{:?} failed ({}): {}", program, output.status, stderr.trim());
    }

    match write_result {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::warn!("{:?} closed stdin before reading all samples", program);
        }
        Err(e) => return Err(e).context("Failed to write samples"),
    }

    Ok(output.stdout)
}
