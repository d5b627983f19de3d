use anyhow::{bail, Context, Result};
use wasm_lens_core::{RandomSource, Tokenizer, Vocabulary};
use wasm_lens_runtime::sampling::draw;
use wasm_lens_runtime::{ForwardRequest, Hyperparameters, RuntimeConfig, WorkerHandle};

struct Args {
    text: String,
    seed: u32,
    steps: usize,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args { text: "Hi!".to_string(), seed: 1337, steps: 8, json: false };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--seed" => {
                let value = iter.next().context("--seed needs a value")?;
                let seed: i64 = value.parse().with_context(|| format!("bad seed '{}'", value))?;
                args.seed = seed as u32;
            }
            "--steps" => {
                let value = iter.next().context("--steps needs a value")?;
                args.steps = value.parse().with_context(|| format!("bad step count '{}'", value))?;
            }
            "--json" => args.json = true,
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            text => args.text = text.to_string(),
        }
    }
    Ok(args)
}

/// True while `text` still encodes without truncation, i.e. BOS, every
/// in-vocabulary character and EOS fit in `seq_len`
fn fits(tokenizer: &Tokenizer, text: &str, seq_len: usize) -> bool {
    let chars = text.chars().filter(|&c| tokenizer.token_to_id(c).is_some()).count();
    chars + 2 <= seq_len
}

fn request(text: &str, seed: u32) -> ForwardRequest {
    let hyper = Hyperparameters::default();
    ForwardRequest {
        text: text.to_string(),
        seq_len: Some(hyper.seq_len),
        temperature: 0.7,
        top_k: 5,
        layer_view: 0,
        head_view: 0,
        mask_index: None,
        seed,
        hyper,
        projection: None,
    }
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let handle = WorkerHandle::spawn(RuntimeConfig::default())?;

    let artifacts = handle.submit_blocking(request(&args.text, args.seed))?.into_result()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
        return Ok(());
    }

    println!("wasm-lens v{}", wasm_lens_runtime::VERSION);
    println!("Tokens: {}", artifacts.token_strings.join(" "));
    println!(
        "Model: {} parameters, ~{} flops per pass",
        artifacts.stats.parameter_count, artifacts.stats.flops
    );
    println!("Top next tokens:");
    for candidate in &artifacts.top_tokens {
        println!("  {:>6} {:>3}  {:.4}", candidate.token, candidate.token_id, candidate.probability);
    }

    let tokenizer = Tokenizer::new();
    let mut rng = RandomSource::seed(args.seed);
    let mut text = args.text.clone();
    let seq_len = Hyperparameters::default().seq_len;
    let mut ranked = artifacts.top_tokens;
    for _ in 0..args.steps {
        if !fits(&tokenizer, &text, seq_len) {
            println!("(stopped: text no longer fits in {} tokens)", seq_len);
            break;
        }
        let id = draw(&ranked, &mut rng)?;
        // stop on a special or symbol-less token
        if id < tokenizer.special_tokens().count() || Vocabulary::global().id_to_token(id).is_none() {
            break;
        }
        text.push_str(tokenizer.token_str(id));
        if !fits(&tokenizer, &text, seq_len) {
            continue;
        }
        ranked = handle.submit_blocking(request(&text, args.seed))?.into_result()?.top_tokens;
    }
    println!("Continuation: {:?}", text);

    handle.shutdown();
    Ok(())
}
