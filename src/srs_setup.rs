//! Structured Reference String (SRS) Setup and Management
//!
//! # What is an SRS?
//!
//! The KZG commitments in this crate need:
//!
//! - **G1 powers**: `[τ⁰·G₁, τ¹·G₁, ..., τᵈ·G₁]` where `d` is the largest
//!   composed-polynomial degree of the configuration
//! - **`[τ]G₂`** for the final pairing check
//!
//! τ must be unknown to everybody. Production keys come from a multi-party
//! Powers-of-Tau ceremony (e.g. the Hermez `powersOfTau28_hez_final_NN.ptau`
//! files), which [`read_ptau`] consumes directly.
//!
//! # File Formats
//!
//! **snarkjs `.ptau`** (little-endian):
//! ```text
//! "ptau" | version u32 | nSections u32
//! repeat nSections: type u32 | size u64 | data[size]
//!   section 1 (header): n8 u32 | q[n8] | power u32 | ceremonyPower u32
//!   section 2 (τ^i·G₁): points of 2·n8 bytes, Montgomery LE x || y
//!   section 3 (τ^i·G₂): points of 4·n8 bytes, Montgomery LE x.c0 || x.c1 || y.c0 || y.c1
//! ```
//!
//! **Arkworks compressed** `G1.bin` / `G2.bin`:
//! ```text
//! [G1Affine; degree+1]
//! [G2Affine; 1 or 2]    // Either [τ·G₂] or [G₂, τ·G₂]
//! ```
//!
//! # Validation Layers
//!
//! 1. **Format validation**: magic, section table, field size and modulus
//! 2. **Structural validation**: enough powers, first element is the generator
//! 3. **Point validation**: every point on the curve and in the prime subgroup
//! 4. **Cryptographic validation**: optional pairing check ([`validate_g1_pairing`])

#![forbid(unsafe_code)]

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::Path,
};

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G2Affine};
use ark_ec::{pairing::Pairing, AffineRepr};
use ark_ff::{BigInt, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rayon::prelude::*;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during SRS setup and validation.
#[derive(Debug, thiserror::Error)]
pub enum SrsSetupError {
    /// File I/O error (file not found, permissions, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to deserialize SRS from binary format
    #[error("deserialization error: {0}")]
    Deserialize(String),

    /// SRS failed cryptographic or structural validation
    #[error("SRS validation failed: {0}")]
    Validation(String),

    /// Pairing check failed (indicates corrupted or malicious SRS)
    #[error("pairing check failed: {0}")]
    PairingCheck(String),
}

// ============================================================================
// Powers-of-Tau (.ptau) reader
// ============================================================================

const PTAU_MAGIC: &[u8; 4] = b"ptau";
const N8: usize = 32;
const G1_SIZE: usize = 2 * N8;
const G2_SIZE: usize = 4 * N8;

/// Byte range of one section's payload.
#[derive(Debug, Clone, Copy)]
struct Section {
    offset: u64,
    size: u64,
}

fn truncated(e: io::Error) -> SrsSetupError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        SrsSetupError::Validation("ptau truncated".into())
    } else {
        SrsSetupError::Io(e)
    }
}

fn read_array<const N: usize, R: Read>(r: &mut R) -> Result<[u8; N], SrsSetupError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, SrsSetupError> {
    Ok(u32::from_le_bytes(read_array(r)?))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64, SrsSetupError> {
    Ok(u64::from_le_bytes(read_array(r)?))
}

fn limbs_le(bytes: &[u8]) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut b = [0u8; 8];
        b.copy_from_slice(chunk);
        *limb = u64::from_le_bytes(b);
    }
    limbs
}

/// Base-field element stored in little-endian Montgomery form.
fn fq_from_montgomery(bytes: &[u8]) -> Result<Fq, SrsSetupError> {
    let repr = BigInt::new(limbs_le(bytes));
    if repr >= Fq::MODULUS {
        return Err(SrsSetupError::Validation("ptau coordinate is not reduced".into()));
    }
    Ok(Fq::new_unchecked(repr))
}

fn g1_from_ptau(bytes: &[u8]) -> Result<G1Affine, SrsSetupError> {
    let x = fq_from_montgomery(&bytes[..N8])?;
    let y = fq_from_montgomery(&bytes[N8..G1_SIZE])?;
    if x == Fq::from(0u64) && y == Fq::from(0u64) {
        return Ok(G1Affine::zero());
    }
    let p = G1Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(SrsSetupError::Validation("ptau G1 point is not on the curve".into()));
    }
    Ok(p)
}

fn g2_from_ptau(bytes: &[u8]) -> Result<G2Affine, SrsSetupError> {
    let x = Fq2::new(fq_from_montgomery(&bytes[..N8])?, fq_from_montgomery(&bytes[N8..2 * N8])?);
    let y = Fq2::new(
        fq_from_montgomery(&bytes[2 * N8..3 * N8])?,
        fq_from_montgomery(&bytes[3 * N8..G2_SIZE])?,
    );
    let p = G2Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(SrsSetupError::Validation("ptau G2 point is not on the curve".into()));
    }
    Ok(p)
}

/// Walk the section table without reading any payload.
fn read_sections<R: Read + Seek>(r: &mut R) -> Result<BTreeMap<u32, Section>, SrsSetupError> {
    let len = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(0))?;

    if &read_array::<4, _>(r)? != PTAU_MAGIC {
        return Err(SrsSetupError::Validation("not a ptau file (bad magic)".into()));
    }
    let _version = read_u32(r)?;
    let n_sections = read_u32(r)?;

    let mut sections = BTreeMap::new();
    for _ in 0..n_sections {
        let kind = read_u32(r)?;
        let size = read_u64(r)?;
        let offset = r.stream_position()?;
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= len)
            .ok_or_else(|| SrsSetupError::Validation(format!("ptau truncated in section {}", kind)))?;
        if sections.insert(kind, Section { offset, size }).is_some() {
            return Err(SrsSetupError::Validation(format!("ptau section {} appears twice", kind)));
        }
        r.seek(SeekFrom::Start(end))?;
    }
    Ok(sections)
}

/// Read `len` bytes starting `skip` bytes into a section.
fn read_range<R: Read + Seek>(r: &mut R, s: Section, skip: u64, len: usize) -> Result<Vec<u8>, SrsSetupError> {
    r.seek(SeekFrom::Start(s.offset + skip))?;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

/// Read the first `n_g1` G1 powers and `[τ]G₂` from a snarkjs `.ptau` file.
///
/// Only the section table, the header and the requested points are read, so
/// large ceremony files are fine.
///
/// # Errors
///
/// - [`SrsSetupError::Io`] if the file cannot be read
/// - [`SrsSetupError::Validation`] on a wrong magic, curve or field size,
///   missing or truncated sections, or invalid points
pub fn read_ptau(path: impl AsRef<Path>, n_g1: usize) -> Result<(Vec<G1Affine>, G2Affine), SrsSetupError> {
    let file = File::open(path.as_ref())?;
    read_ptau_from(&mut BufReader::new(file), n_g1)
}

/// [`read_ptau`] over an in-memory buffer.
pub fn parse_ptau(bytes: &[u8], n_g1: usize) -> Result<(Vec<G1Affine>, G2Affine), SrsSetupError> {
    read_ptau_from(&mut io::Cursor::new(bytes), n_g1)
}

/// [`read_ptau`] over any seekable reader.
pub fn read_ptau_from<R: Read + Seek>(r: &mut R, n_g1: usize) -> Result<(Vec<G1Affine>, G2Affine), SrsSetupError> {
    let sections = read_sections(r)?;
    let section = |kind: u32| {
        sections
            .get(&kind)
            .copied()
            .ok_or_else(|| SrsSetupError::Validation(format!("ptau section {} missing", kind)))
    };

    // Layer 1: header
    let header = section(1)?;
    r.seek(SeekFrom::Start(header.offset))?;
    let n8 = read_u32(r)? as usize;
    if n8 != N8 {
        return Err(SrsSetupError::Validation(format!("ptau field size {} bytes, expected {}", n8, N8)));
    }
    let q = read_array::<N8, _>(r)?;
    if BigInt::new(limbs_le(&q)) != Fq::MODULUS {
        return Err(SrsSetupError::Validation("ptau curve is not BN254".into()));
    }

    // Layer 2: sizes
    let g1_section = section(2)?;
    let available = g1_section.size / G1_SIZE as u64;
    if available < n_g1 as u64 {
        return Err(SrsSetupError::Validation(format!(
            "ptau holds {} G1 powers, need at least {}",
            available, n_g1
        )));
    }
    let g2_section = section(3)?;
    if g2_section.size < 2 * G2_SIZE as u64 {
        return Err(SrsSetupError::Validation("ptau G2 section lacks [τ]G₂".into()));
    }

    // Layer 3: points
    let raw = read_range(r, g1_section, 0, n_g1 * G1_SIZE)?;
    let g1_powers = raw
        .par_chunks_exact(G1_SIZE)
        .map(g1_from_ptau)
        .collect::<Result<Vec<_>, _>>()?;
    if g1_powers.first().map_or(false, |g| *g != G1Affine::generator()) {
        return Err(SrsSetupError::Validation("ptau first G1 power is not the generator".into()));
    }
    let tau_g2 = g2_from_ptau(&read_range(r, g2_section, G2_SIZE as u64, G2_SIZE)?)?;
    if tau_g2.is_zero() {
        return Err(SrsSetupError::Validation("τ·G₂ is the point at infinity (invalid SRS)".into()));
    }

    tracing::info!(n_g1, available, "ptau powers loaded");
    Ok((g1_powers, tau_g2))
}

// ============================================================================
// Arkworks SRS files
// ============================================================================

fn read_compressed<T: CanonicalDeserialize>(path: &Path, what: &str) -> Result<T, SrsSetupError> {
    let file = File::open(path)?;
    T::deserialize_compressed(BufReader::new(file))
        .map_err(|e| SrsSetupError::Deserialize(format!("{} ({}): {}", what, path.display(), e)))
}

fn write_compressed<T: CanonicalSerialize>(path: &Path, value: &T, what: &str) -> Result<(), SrsSetupError> {
    let mut out = BufWriter::new(File::create(path)?);
    value
        .serialize_compressed(&mut out)
        .map_err(|e| SrsSetupError::Validation(format!("{} serialize: {}", what, e)))?;
    out.flush()?;
    Ok(())
}

/// G1 powers from an arkworks-compressed `Vec<G1Affine>` file, trimmed to
/// `n_g1`. The first power must be the generator.
pub fn load_and_validate_g1_srs(path: impl AsRef<Path>, n_g1: usize) -> Result<Vec<G1Affine>, SrsSetupError> {
    let mut powers: Vec<G1Affine> = read_compressed(path.as_ref(), "G1 powers")?;
    if powers.len() < n_g1 {
        return Err(SrsSetupError::Validation(format!(
            "G1 file holds {} powers, need at least {}",
            powers.len(),
            n_g1
        )));
    }
    if powers.first().map_or(false, |g| *g != G1Affine::generator()) {
        return Err(SrsSetupError::Validation("G1 file: first power is not the generator".into()));
    }
    powers.truncate(n_g1);
    Ok(powers)
}

/// `[τ]G₂` from an arkworks-compressed `Vec<G2Affine>` file holding either
/// `[τG₂]` or `[G₂, τG₂]`.
pub fn load_and_validate_g2_srs(path: impl AsRef<Path>) -> Result<G2Affine, SrsSetupError> {
    let elements: Vec<G2Affine> = read_compressed(path.as_ref(), "G2 powers")?;
    let tau_g2 = match elements.as_slice() {
        [] => return Err(SrsSetupError::Validation("G2 file is empty, need [τ]G₂".into())),
        [tau] => *tau,
        [g, tau, ..] if *g == G2Affine::generator() => *tau,
        _ => return Err(SrsSetupError::Validation("G2 file: expected [G₂, τG₂]".into())),
    };
    if tau_g2.is_zero() {
        return Err(SrsSetupError::Validation("τ·G₂ is the point at infinity (invalid SRS)".into()));
    }
    Ok(tau_g2)
}

/// `e([τ]G₁, G₂) == e(G₁, [τ]G₂)`: the G1 powers and `[τ]G₂` share one τ.
pub fn validate_g1_pairing(g1_powers: &[G1Affine], tau_g2: G2Affine) -> Result<(), SrsSetupError> {
    let [g, tau_g1, ..] = g1_powers else {
        return Err(SrsSetupError::Validation("pairing check needs at least 2 G1 powers".into()));
    };
    if Bn254::pairing(*tau_g1, G2Affine::generator()) != Bn254::pairing(*g, tau_g2) {
        return Err(SrsSetupError::PairingCheck("G1 powers and [τ]G₂ use different τ".into()));
    }
    Ok(())
}

// ============================================================================
// Development SRS Generation (NOT FOR PRODUCTION)
// ============================================================================

/// Deterministic development SRS with a **publicly known** τ (seed 42).
///
/// Anyone can forge proofs against it. Tests and local experiments only.
#[cfg(any(test, feature = "dev-srs"))]
pub fn generate_dev_srs(degree: usize) -> (Vec<G1Affine>, G2Affine) {
    use ark_bn254::{Fr, G1Projective};
    use ark_ec::CurveGroup;
    use ark_ff::{One, UniformRand};
    use rand::{rngs::StdRng, SeedableRng};

    tracing::warn!(degree, "generating DEVELOPMENT SRS (seed=42, τ is PUBLIC); never use in production");

    let mut rng = StdRng::from_seed([42u8; 32]);
    let tau = Fr::rand(&mut rng);

    let g1_gen = G1Projective::from(G1Affine::generator());
    let mut projective = Vec::with_capacity(degree + 1);
    let mut tau_pow = Fr::one();
    for _ in 0..=degree {
        projective.push(g1_gen * tau_pow);
        tau_pow *= tau;
    }
    let g1_powers = G1Projective::normalize_batch(&projective);
    let tau_g2 = (G2Affine::generator() * tau).into_affine();

    (g1_powers, tau_g2)
}

/// Write G1 powers as an arkworks-compressed `Vec<G1Affine>`.
pub fn save_g1_srs(path: impl AsRef<Path>, powers: &[G1Affine]) -> Result<(), SrsSetupError> {
    write_compressed(path.as_ref(), &powers.to_vec(), "G1 powers")
}

/// Write `[G₂, τG₂]` as an arkworks-compressed `Vec<G2Affine>`.
pub fn save_g2_srs(path: impl AsRef<Path>, tau_g2: G2Affine) -> Result<(), SrsSetupError> {
    write_compressed(path.as_ref(), &vec![G2Affine::generator(), tau_g2], "G2 powers")
}

// ============================================================================
// Tests
// ============================================================================
