use chunkbench_common::{BenchError, Result};
use rand::rngs::OsRng;
use rand::RngCore;

/// `len` bytes straight from the operating system's CSPRNG.
pub fn random_payload(len: u64) -> Result<Vec<u8>> {
    let len = usize::try_from(len)
        .map_err(|_| BenchError::RandomGeneration(format!("payload of {len} bytes does not fit in memory")))?;
    let mut buf = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| BenchError::RandomGeneration(e.to_string()))?;
    Ok(buf)
}
