//! Operator CLI for the opening protocol
//!
//! ```text
//! shplonk layout       --config cfg.json
//! shplonk prove-random --config cfg.json (--ptau file.ptau | --g1 g1.bin --g2 g2.bin | --dev) [--seed N]
//! shplonk export-srs   --ptau file.ptau --powers N --g1 g1.bin --g2 g2.bin
//! ```
//!
//! `layout` prints the composed-polynomial layout as JSON. `prove-random`
//! runs setup, commits random polynomials of the declared degrees stage by
//! stage, opens, verifies and prints the calldata words. `export-srs` copies
//! the first `N` powers of a `.ptau` file into arkworks files for `--g1/--g2`.
//! `--dev` needs the `dev-srs` feature and uses a publicly known τ.

#![forbid(unsafe_code)]

use std::env;

use anyhow::{anyhow, Context};
use ark_ff::UniformRand;
use rand::{rngs::StdRng, SeedableRng};
use shplonk::{
    commit, export_calldata, open, preprocess, setup_from_files, setup_from_ptau, srs_setup, verify_openings,
    CommittedPolynomials, Config, OpenOptions, Polynomial, PolynomialMap, ProvingKey, F,
};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn load_config(args: &[String]) -> anyhow::Result<Config> {
    let path = parse_flag(args, "--config").ok_or_else(|| anyhow!("--config <file> is required"))?;
    Ok(Config::from_json_file(&path).with_context(|| format!("loading config {}", path))?)
}

#[cfg(feature = "dev-srs")]
fn dev_key(config: &Config) -> anyhow::Result<ProvingKey> {
    use shplonk::setup::{layout, needed_powers, setup_with_layout};

    let (f, roots) = layout(config)?;
    let (g1, g2) = srs_setup::generate_dev_srs(needed_powers(&f) - 1);
    Ok(setup_with_layout(config, f, roots, &shplonk::Srs::new(g1, g2)?)?)
}

#[cfg(not(feature = "dev-srs"))]
fn dev_key(_config: &Config) -> anyhow::Result<ProvingKey> {
    Err(anyhow!("--dev requires building with `--features dev-srs`"))
}

fn cmd_layout(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let (f, roots) = shplonk::setup::layout(&config)?;
    tracing::info!(n_f = f.len(), power_w = roots.power_w(), "layout computed");
    println!("{}", serde_json::to_string_pretty(&f)?);
    Ok(())
}

fn cmd_prove_random(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let mut pk = match (parse_flag(args, "--ptau"), parse_flag(args, "--g1"), parse_flag(args, "--g2")) {
        (Some(path), _, _) => setup_from_ptau(&config, &path).with_context(|| format!("setup from {}", path))?,
        (None, Some(g1), Some(g2)) => {
            setup_from_files(&config, &g1, &g2).with_context(|| format!("setup from {} and {}", g1, g2))?
        }
        _ if has_flag(args, "--dev") => dev_key(&config)?,
        _ => return Err(anyhow!("one of --ptau <file>, --g1 <file> --g2 <file> or --dev is required")),
    };

    let seed: u64 = match parse_flag(args, "--seed") {
        Some(s) => s.parse().map_err(|_| anyhow!("--seed must be a u64 (got `{}`)", s))?,
        None => 1,
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let mut polynomials = PolynomialMap::new();
    for def in config.pol_defs.iter().flatten() {
        polynomials
            .entry(def.name.clone())
            .or_insert_with(|| Polynomial::from_coeffs((0..=def.degree).map(|_| F::rand(&mut rng)).collect()));
    }

    let stages: std::collections::BTreeSet<u32> =
        pk.f().iter().flat_map(|fi| fi.stages.iter().map(|s| s.stage)).filter(|s| *s > 0).collect();
    let mut committed: CommittedPolynomials = preprocess(&mut pk, &polynomials)?.into_iter().collect();
    for stage in stages {
        committed.extend(commit(stage, &pk, &polynomials, true)?);
    }

    let options = OpenOptions::default();
    let proof = open(&pk, &polynomials, &committed, &options)?;
    if !verify_openings(&pk.vk, &proof, &options)? {
        return Err(anyhow!("freshly generated proof did not verify"));
    }
    tracing::info!("proof verified");

    let calldata = export_calldata(&pk.vk, &proof, &options)?;
    println!("{}", serde_json::to_string_pretty(&calldata.to_json())?);
    Ok(())
}

fn cmd_export_srs(args: &[String]) -> anyhow::Result<()> {
    let required = |key: &str| parse_flag(args, key).ok_or_else(|| anyhow!("{} is required", key));
    let ptau = required("--ptau")?;
    let powers: usize = required("--powers")?
        .parse()
        .map_err(|_| anyhow!("--powers must be a positive integer"))?;
    let (g1_path, g2_path) = (required("--g1")?, required("--g2")?);

    let (g1, tau_g2) = srs_setup::read_ptau(&ptau, powers).with_context(|| format!("reading {}", ptau))?;
    srs_setup::validate_g1_pairing(&g1, tau_g2)?;
    srs_setup::save_g1_srs(&g1_path, &g1)?;
    srs_setup::save_g2_srs(&g2_path, tau_g2)?;
    tracing::info!(powers, g1 = %g1_path, g2 = %g2_path, "SRS exported");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "shplonk=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("layout") => cmd_layout(&args),
        Some("prove-random") => cmd_prove_random(&args),
        Some("export-srs") => cmd_export_srs(&args),
        _ => Err(anyhow!(
            "usage: shplonk layout --config <file>\n       \
             shplonk prove-random --config <file> (--ptau <file> | --g1 <file> --g2 <file> | --dev) [--seed N]\n       \
             shplonk export-srs --ptau <file> --powers N --g1 <file> --g2 <file>"
        )),
    }
}
