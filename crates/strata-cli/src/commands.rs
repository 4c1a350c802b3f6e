use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use strata_crypto::{
    ChainVerifier, ContentHasher, CrossReferenceHasher, HashLayer, MerkleProofService,
    MerkleTreeBuilder, Side, TimeLock, TimeLockCommitment, Violation,
};
use strata_index::{IntegrityReport, Manifest, ManifestDiff};
use strata_ledger::{
    Attestor, BundleInfo, InMemoryChainLog, LogReader, LogValidator, LogWriter,
    PersistentChainLog,
};
use strata_types::{Clock, Digest, HybridLogicalClock, Timestamp};

use crate::cli::*;
use crate::config::StrataConfig;

struct Session {
    config: StrataConfig,
    format: OutputFormat,
    clock: Arc<dyn Clock>,
}

impl Session {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = StrataConfig::load(cli.config.as_deref())?;
    let ctx = Session {
        clock: Arc::new(HybridLogicalClock::new(config.node_id)),
        config,
        format: cli.format,
    };
    match cli.command {
        Command::Hash(args) => cmd_hash(&ctx, args),
        Command::VerifyLog => cmd_verify_log(&ctx),
        Command::Report(args) => cmd_report(&ctx, args),
        Command::Manifest(args) => cmd_manifest(&ctx, args),
        Command::Check(args) => cmd_check(&ctx, args),
        Command::Merkle(args) => cmd_merkle(&ctx, args),
        Command::Xref(args) => cmd_xref(&ctx, args),
        Command::Lock(args) => cmd_lock(&ctx, args),
        Command::Unlock(args) => cmd_unlock(&ctx, args),
        Command::Demo => cmd_demo(&ctx),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_layers(chain: &[HashLayer]) {
    for layer in chain {
        println!(
            "  {} {:<9} {}",
            format!("L{}", layer.level).yellow(),
            layer.algorithm.as_str().cyan(),
            layer.hash.short_hex().dimmed()
        );
    }
}

fn print_violations(violations: &[Violation]) {
    for v in violations {
        println!(
            "  {} layer {} (level {}): {}",
            "✗".red(),
            v.index,
            v.level,
            v.description
        );
    }
}

fn cmd_hash(ctx: &Session, args: HashArgs) -> anyhow::Result<()> {
    let builder = ctx.config.chain_builder()?;
    let depth = args.depth.unwrap_or(ctx.config.depth);
    let chain = builder.build_chain(args.content.as_bytes(), depth, &*ctx.clock, None)?;

    let persisted = if args.no_persist {
        None
    } else {
        let log = PersistentChainLog::open(&ctx.config.state_file, ctx.clock.clone())?;
        log.append_chain(&chain)?;
        Some(log.layer_count()?)
    };

    if ctx.json() {
        return print_json(&chain);
    }
    println!("{} Built {}-layer chain", "✓".green().bold(), chain.len());
    print_layers(&chain);
    if let Some(last) = chain.last() {
        println!("  Final: {}", last.hash.to_hex().bold());
    }
    if let Some(total) = persisted {
        println!(
            "  Appended to {} ({} layers total)",
            ctx.config.state_file.display(),
            total
        );
    }
    Ok(())
}

fn cmd_verify_log(ctx: &Session) -> anyhow::Result<()> {
    let log = PersistentChainLog::open(&ctx.config.state_file, ctx.clock.clone())?;
    let report = LogValidator::validate(&log)?;

    if ctx.json() {
        print_json(&report)?;
    } else if report.is_valid() {
        println!("{} Chain log integrity verified", "✓".green().bold());
        println!("  Layers: {}", report.layer_count.to_string().bold());
        println!("  Chains: {}", report.segment_count.to_string().bold());
        if let Some(root) = log.merkle_root()? {
            println!("  Merkle root: {}", root.short_hex().cyan());
        }
    } else {
        println!("{} Chain log failed verification", "✗".red().bold());
        print_violations(&report.violations);
    }

    if !report.is_valid() {
        bail!("{} violation(s) in chain log", report.violations.len());
    }
    Ok(())
}

fn cmd_report(ctx: &Session, args: ReportArgs) -> anyhow::Result<()> {
    let report = IntegrityReport::generate(
        &args.dir,
        &ctx.config.scan_options(),
        &ctx.config.chain_builder()?,
        &*ctx.clock,
        ctx.config.depth,
    )?;

    if ctx.json() {
        return print_json(&report);
    }
    println!("Integrity report for {}", report.directory.bold());
    println!("  Generated: {}", report.generated);
    println!("  Files: {}", report.file_count.to_string().bold());
    println!("  Merkle root: {}", report.merkle_root.to_hex().cyan());
    for level in &report.verification_chain {
        println!(
            "  {} {:<9} {}",
            format!("L{}", level.level).yellow(),
            level.algorithm.as_str().cyan(),
            level.hash_prefix.dimmed()
        );
    }
    println!("  Final: {}", report.final_hash.to_hex().bold());
    Ok(())
}

fn cmd_manifest(ctx: &Session, args: ManifestArgs) -> anyhow::Result<()> {
    let manifest = Manifest::generate(&args.dir, &ctx.config.scan_options(), ctx.clock.now())?;
    manifest.save(&args.output)?;

    if ctx.json() {
        return print_json(&json!({
            "output": args.output,
            "file_count": manifest.file_count,
            "manifest_hash": manifest.manifest_hash,
        }));
    }
    println!(
        "{} Wrote manifest of {} files to {}",
        "✓".green().bold(),
        manifest.file_count,
        args.output.display().to_string().bold()
    );
    println!("  Hash: {}", manifest.manifest_hash.short_hex().cyan());
    Ok(())
}

fn print_diff(diff: &ManifestDiff) {
    for path in &diff.added {
        println!("  {} {}", "added:".green(), path);
    }
    for path in &diff.removed {
        println!("  {} {}", "removed:".red(), path);
    }
    for path in &diff.modified {
        println!("  {} {}", "modified:".yellow(), path);
    }
}

fn cmd_check(ctx: &Session, args: CheckArgs) -> anyhow::Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let self_consistent = manifest.verify_hash()?;
    let diff = manifest.check(&args.dir, &ctx.config.scan_options())?;

    if ctx.json() {
        print_json(&json!({
            "manifest_hash_valid": self_consistent,
            "valid": diff.is_valid(),
            "diff": diff,
        }))?;
    } else {
        if !self_consistent {
            println!("{} manifest hash does not match its file list", "!".yellow().bold());
        }
        print_diff(&diff);
        if diff.is_valid() {
            println!(
                "{} {} unchanged, {} added",
                "✓".green().bold(),
                diff.unchanged.len(),
                diff.added.len()
            );
        } else {
            println!("{} Directory does not match manifest", "✗".red().bold());
        }
    }

    if !diff.is_valid() {
        bail!(
            "{} removed, {} modified",
            diff.removed.len(),
            diff.modified.len()
        );
    }
    Ok(())
}

fn cmd_merkle(ctx: &Session, args: MerkleArgs) -> anyhow::Result<()> {
    let tree = MerkleTreeBuilder::default().build(&args.items);
    let proof = match &args.prove {
        Some(item) => {
            let service = MerkleProofService::default();
            let proof = service.proof_for(item.as_bytes(), &tree)?;
            let verified = service.verify(item.as_bytes(), &proof, tree.root_hash());
            Some((item, proof, verified))
        }
        None => None,
    };

    if ctx.json() {
        return print_json(&json!({
            "root": tree.root_hash(),
            "leaf_count": tree.leaf_count(),
            "proof": proof.as_ref().map(|(item, proof, verified)| json!({
                "item": item,
                "path": proof.path,
                "verified": verified,
            })),
        }));
    }
    println!("Merkle root over {} items", tree.leaf_count());
    println!("  {}", tree.root_hash().to_hex().bold());
    if let Some((item, proof, verified)) = proof {
        println!("Proof for {} ({} steps)", item.yellow(), proof.len());
        for (sibling, side) in &proof.path {
            let side = match side {
                Side::Left => "left",
                Side::Right => "right",
            };
            println!("  {:<5} {}", side, sibling.short_hex().dimmed());
        }
        if verified {
            println!("{} Proof verifies", "✓".green().bold());
        } else {
            println!("{} Proof does not verify", "✗".red().bold());
        }
    }
    Ok(())
}

fn cmd_xref(ctx: &Session, args: XrefArgs) -> anyhow::Result<()> {
    let commitment = CrossReferenceHasher::default().cross_reference(args.pairs)?;

    if ctx.json() {
        return print_json(&commitment);
    }
    println!("Cross-reference over {} keys", commitment.intermediates.len());
    for (key, digest) in &commitment.intermediates {
        println!("  {:<16} {}", key.yellow(), digest.short_hex().dimmed());
    }
    println!("  Digest: {}", commitment.digest.to_hex().bold());
    Ok(())
}

fn cmd_lock(ctx: &Session, args: LockArgs) -> anyhow::Result<()> {
    let until = Timestamp::parse_rfc3339(&args.until)
        .with_context(|| format!("invalid --until time `{}`", args.until))?;
    let commitment = TimeLock::default().lock(args.content.as_bytes(), until, ctx.clock.now());
    let json = serde_json::to_string_pretty(&commitment)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            if ctx.json() {
                println!("{json}");
            } else {
                println!(
                    "{} Locked until {}, commitment written to {}",
                    "✓".green().bold(),
                    until.to_rfc3339().yellow(),
                    path.display().to_string().bold()
                );
            }
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_unlock(ctx: &Session, args: UnlockArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.commitment)
        .with_context(|| format!("reading {}", args.commitment.display()))?;
    let commitment: TimeLockCommitment = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", args.commitment.display()))?;
    let outcome = TimeLock::default().verify(&commitment, args.content.as_bytes(), ctx.clock.now());

    if ctx.json() {
        print_json(&json!({
            "valid": outcome.is_ok(),
            "error": outcome.as_ref().err().map(ToString::to_string),
        }))?;
    } else if outcome.is_ok() {
        println!("{} Commitment verified", "✓".green().bold());
    } else if let Err(e) = &outcome {
        println!("{} {}", "✗".red().bold(), e);
    }
    outcome.map_err(Into::into)
}

fn cmd_demo(ctx: &Session) -> anyhow::Result<()> {
    let text = !ctx.json();
    let builder = ctx.config.chain_builder()?;

    // Chain build, verify, tamper.
    let chain = builder.build_chain(b"hello", ctx.config.depth, &*ctx.clock, None)?;
    let clean = ChainVerifier::verify_with_content(&chain, b"hello");
    let mut tampered = chain.clone();
    if let Some(layer) = tampered.get_mut(1) {
        layer.hash = layer.hash.with_flipped_bit(0);
    }
    let tampered_report = ChainVerifier::verify(&tampered);
    if text {
        println!("{}", "Hash chain".bold());
        print_layers(&chain);
        println!("  untouched chain valid: {}", clean.is_valid());
        println!(
            "  after flipping one bit: {} violation(s)",
            tampered_report.violations.len()
        );
    }

    // Merkle proof for a present and an absent item.
    let items = ["alpha", "beta", "gamma"];
    let tree = MerkleTreeBuilder::default().build(items);
    let service = MerkleProofService::default();
    let proof = service.proof_for(b"beta", &tree)?;
    let proof_ok = service.verify(b"beta", &proof, tree.root_hash());
    let absent = service.proof_for(b"delta", &tree).err();
    if text {
        println!("{}", "Merkle tree".bold());
        println!("  root: {}", tree.root_hash().short_hex().cyan());
        println!("  proof for beta ({} steps) verifies: {}", proof.len(), proof_ok);
        if let Some(e) = &absent {
            println!("  proof for delta: {e}");
        }
    }

    // Cross-reference.
    let xref = CrossReferenceHasher::default();
    let fields = [("task_id", "TASK-001"), ("pr", "PR-42"), ("branch", "main")];
    let commitment = xref.cross_reference(fields)?;
    let reordered = xref.verify(
        [("branch", "main"), ("pr", "PR-42"), ("task_id", "TASK-001")],
        &commitment.digest,
    )?;
    if text {
        println!("{}", "Cross-reference".bold());
        println!("  digest: {}", commitment.digest.short_hex().cyan());
        println!("  reordered entries match: {reordered}");
    }

    // Time lock, checked before and after its unlock time.
    let now = ctx.clock.now();
    let lock_time = Timestamp::from_millis(now.physical_ms + 60_000);
    let lock = TimeLock::default();
    let locked = lock.lock(b"sealed bid", lock_time, now);
    let early = lock.verify(&locked, b"sealed bid", now);
    let late = lock.verify(&locked, b"sealed bid", lock_time);
    if text {
        println!("{}", "Time lock".bold());
        println!("  commitment: {}", locked.commitment_hash.short_hex().cyan());
        match &early {
            Ok(()) => println!("  now: verified"),
            Err(e) => println!("  now: {e}"),
        }
        println!("  at unlock time: verified = {}", late.is_ok());
    }

    // Attestation into an in-memory log, then whole-log validation.
    let log = Arc::new(InMemoryChainLog::new(ctx.clock.clone()));
    let attestor = Attestor::new(log.clone(), builder, ctx.clock.clone(), ctx.config.depth);
    let task_record = json!({"id": "TASK-001", "title": "Demo task"});
    let task = attestor.attest_task(&task_record)?;
    let files: BTreeMap<String, Digest> = items
        .iter()
        .map(|name| (format!("{name}.txt"), ContentHasher::SHA256.hash(name.as_bytes())))
        .collect();
    let info = BundleInfo {
        id: "PR-42".into(),
        title: "Demo bundle".into(),
        branch: "main".into(),
        task_id: task.task_id.clone(),
    };
    let bundle = attestor.attest_bundle(&info, &files)?;
    let commit = attestor.attest_commit("0a1b2c3", &files)?;
    let bundle_check = attestor.validate_bundle(&info, Some(&task_record), &files)?;
    let verification = attestor.verify_task(&task.task_id)?;
    let log_report = LogValidator::validate(&*log)?;
    if text {
        println!("{}", "Attestation".bold());
        println!(
            "  task {}: {} layers, valid = {}",
            task.task_id.yellow(),
            verification.layers_verified,
            verification.is_valid()
        );
        println!(
            "  bundle {}: {} files, cross-reference {}",
            bundle.bundle_id.yellow(),
            bundle.file_count,
            bundle.cross_reference.short_hex().cyan()
        );
        println!(
            "  commit {}: {}",
            commit.sha.yellow(),
            commit.commit_hash.short_hex().cyan()
        );
        println!(
            "  bundle validation: {} checks, valid = {}",
            bundle_check.checks.len(),
            bundle_check.valid
        );
        println!(
            "  log: {} layers in {} chain(s), valid = {}",
            log_report.layer_count,
            log_report.segment_count,
            log_report.is_valid()
        );
        return Ok(());
    }

    print_json(&json!({
        "chain": {
            "final_hash": chain.last().map(|l| &l.hash),
            "valid": clean.is_valid(),
            "tampered_violations": tampered_report.violations.len(),
        },
        "merkle": {
            "root": tree.root_hash(),
            "proof_verified": proof_ok,
            "absent_item_error": absent.map(|e| e.to_string()),
        },
        "cross_reference": {
            "digest": commitment.digest,
            "reordered_match": reordered,
        },
        "time_lock": {
            "commitment_hash": locked.commitment_hash,
            "early_error": early.err().map(|e| e.to_string()),
            "verified_at_unlock": late.is_ok(),
        },
        "attestation": {
            "task_final_hash": task.final_hash,
            "task_valid": verification.is_valid(),
            "bundle_cross_reference": bundle.cross_reference,
            "commit_hash": commit.commit_hash,
            "bundle_validation": bundle_check,
            "log": log_report,
        },
    }))
}
