//! Calldata export for an on-chain verifier.
//!
//! Proof words, in order:
//!
//! 1. `[W]₁`, `[W']₁` (uncompressed, two words each);
//! 2. every non-preprocessed `f_i` commitment, by index;
//! 3. the committed evaluations in canonical order;
//! 4. `inv`.
//!
//! followed by two optional inputs: the xi seed word (external or chained
//! seeds only) and the non-committed evaluations in the order listed in
//! [`OpenOptions::non_committed`]. Every word is 32 bytes big-endian.

#![allow(missing_docs)]

use serde_json::{json, Value};

use crate::{
    error::ProtocolError,
    evals::{committed_evals, ordered_evals},
    pcs::{g1_to_bytes, Commitment},
    prover::OpeningProof,
    setup::VerifyingKey,
    transcript::{scalar_to_bytes, OpenOptions},
    F,
};

/// One 32-byte big-endian EVM word.
pub type Word = [u8; 32];

/// Verifier inputs as 32-byte words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calldata {
    /// Fixed-layout proof words.
    pub proof: Vec<Word>,
    pub xi_seed: Option<Word>,
    /// Non-committed evaluations, in caller order.
    pub non_committed: Vec<Word>,
}

fn push_commitment(words: &mut Vec<Word>, c: &Commitment) {
    let bytes = g1_to_bytes(&c.0);
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&bytes[..32]);
    y.copy_from_slice(&bytes[32..]);
    words.push(x);
    words.push(y);
}

fn push_scalar(words: &mut Vec<Word>, f: &F) {
    words.push(scalar_to_bytes(f));
}

/// `0x`-prefixed hex of a word.
pub fn word_hex(w: &Word) -> String {
    format!("0x{}", hex::encode(w))
}

impl Calldata {
    pub fn proof_hex(&self) -> Vec<String> {
        self.proof.iter().map(word_hex).collect()
    }

    /// `[proof words, xi seed?, non-committed evals?]`, matching the
    /// verifier's argument list.
    pub fn to_json(&self) -> Value {
        let mut inputs = vec![json!(self.proof_hex())];
        if let Some(seed) = &self.xi_seed {
            inputs.push(json!(word_hex(seed)));
        }
        if !self.non_committed.is_empty() {
            inputs.push(json!(self.non_committed.iter().map(word_hex).collect::<Vec<_>>()));
        }
        Value::Array(inputs)
    }
}

/// Lay out `proof` for the verifier described by `vk`.
pub fn export_calldata(
    vk: &VerifyingKey,
    proof: &OpeningProof,
    options: &OpenOptions,
) -> Result<Calldata, ProtocolError> {
    let mut words = Vec::new();
    push_commitment(&mut words, &proof.commits.w);
    push_commitment(&mut words, &proof.commits.wp);

    for fi in vk.f.iter().filter(|fi| !fi.is_preprocessed()) {
        let c = proof
            .commits
            .f
            .get(&fi.index)
            .ok_or_else(|| ProtocolError::MissingCommitment(format!("f{}", fi.index)))?;
        push_commitment(&mut words, c);
    }

    let ordered = ordered_evals(&vk.f, &proof.evaluations)?;
    for e in committed_evals(&ordered, &options.non_committed) {
        push_scalar(&mut words, e);
    }
    push_scalar(&mut words, &proof.inv);

    let non_committed = options
        .non_committed
        .iter()
        .map(|name| {
            proof
                .evaluations
                .get(name)
                .map(scalar_to_bytes)
                .ok_or_else(|| ProtocolError::MissingEvaluation(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Calldata {
        proof: words,
        xi_seed: options.xi_seed.calldata_word().map(|s| scalar_to_bytes(&s)),
        non_committed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composed::{ComposedPolynomial, PolRef, StagePols};
    use crate::prover::ProofCommitments;
    use crate::roots::RootsOfUnityTable;
    use crate::transcript::XiSeed;
    use ark_bn254::{G1Affine, G2Affine};
    use ark_ec::AffineRepr;
    use std::collections::BTreeMap;

    fn fi(index: usize, name: &str, stage: u32) -> ComposedPolynomial {
        ComposedPolynomial {
            index,
            pols: vec![name.to_string()],
            opening_points: vec![0],
            degree: 3,
            stages: vec![StagePols { stage, pols: vec![PolRef { name: name.to_string(), degree: 3 }] }],
        }
    }

    fn fixture() -> (VerifyingKey, OpeningProof) {
        let f = vec![fi(0, "S", 0), fi(1, "A", 1), fi(2, "B", 1)];
        let roots = RootsOfUnityTable::build(2, &f).unwrap();
        let vk = VerifyingKey {
            power: 2,
            f,
            roots,
            n_opening_points: 1,
            x2: G2Affine::generator(),
            preprocessed: BTreeMap::new(),
        };

        let g = Commitment(G1Affine::generator());
        let commits = ProofCommitments {
            f: (0..3).map(|i| (i, g)).collect(),
            w: Commitment::identity(),
            wp: g,
        };
        let evaluations: BTreeMap<String, F> =
            [("S", 1u64), ("A", 2), ("B", 3)].iter().map(|(n, v)| (n.to_string(), F::from(*v))).collect();
        let proof = OpeningProof { commits, evaluations, inv: F::from(9u64), xi_seed: F::from(5u64) };
        (vk, proof)
    }

    #[test]
    fn fixed_word_layout() {
        let (vk, proof) = fixture();
        let cd = export_calldata(&vk, &proof, &OpenOptions::default()).unwrap();

        // W, W', f1, f2 (f0 is preprocessed), then A, B, S and inv.
        assert_eq!(cd.proof.len(), 4 + 4 + 3 + 1);
        assert_eq!(cd.proof[0], [0u8; 32]);
        assert_eq!(cd.proof[2][31], 1);
        assert_eq!(cd.proof[3][31], 2);
        let tail: Vec<u8> = cd.proof[8..].iter().map(|w| w[31]).collect();
        assert_eq!(tail, vec![1, 2, 3, 9]);
        assert!(cd.xi_seed.is_none());
        assert_eq!(cd.to_json().as_array().unwrap().len(), 1);
    }

    #[test]
    fn optional_inputs() {
        let (vk, proof) = fixture();
        let options = OpenOptions { xi_seed: XiSeed::External(F::from(0xabu64)), non_committed: vec!["B".into()] };
        let cd = export_calldata(&vk, &proof, &options).unwrap();

        assert_eq!(cd.proof.len(), 4 + 4 + 2 + 1);
        assert_eq!(cd.non_committed, vec![scalar_to_bytes(&F::from(3u64))]);
        let json = cd.to_json();
        let inputs = json.as_array().unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[1], json!(format!("0x{}ab", "0".repeat(62))));

        let options = OpenOptions { non_committed: vec!["Z".into()], ..Default::default() };
        assert!(matches!(
            export_calldata(&vk, &proof, &options),
            Err(ProtocolError::MissingEvaluation(n)) if n == "Z"
        ));
    }
}
