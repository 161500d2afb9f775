use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use solrsmart_backend::{CancellationToken, Settings, SmartSearchRequest};
use solrsmart_core::{
    summarize_schema, CompileOptions, Compiler, FieldCatalog, FieldDescriptor, Plan, SearchMode,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "solrsmart")]
#[command(about = "Schema-aware natural-language search for Solr", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the field catalog and role guesses for a collection
    Schema { collection: String },
    /// Plan and run a natural-language search
    Search {
        collection: String,
        query: String,
        #[arg(long, default_value = "")]
        locale: String,
        #[arg(long, default_value_t = 10)]
        rows: usize,
        #[arg(long, default_value_t = 0)]
        start: usize,
        #[arg(long)]
        allow_vector: bool,
        #[arg(long)]
        allow_hybrid: bool,
    },
    /// Compile a plan file offline and print the backend request
    Compile {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        fields: String,
        #[arg(long, default_value = "id")]
        unique_key: String,
        #[arg(long, default_value_t = 10)]
        rows: usize,
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Length of the placeholder embedding used for vector bodies
        #[arg(long, default_value_t = 4)]
        dims: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let out = match cli.cmd {
        Cmd::Schema { collection } => {
            let engine = Settings::from_env()?.build_engine()?;
            let fc = engine
                .schema(&collection, &CancellationToken::new())
                .await?;
            json!({"catalog": &*fc, "summary": summarize_schema(&fc)})
        }
        Cmd::Search {
            collection,
            query,
            locale,
            rows,
            start,
            allow_vector,
            allow_hybrid,
        } => {
            let engine = Settings::from_env()?.build_engine()?;
            let req = SmartSearchRequest {
                collection,
                query,
                locale,
                rows,
                start,
                allow_vector,
                allow_hybrid,
            };
            let token = CancellationToken::new();
            let ctrl_c = token.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                ctrl_c.cancel();
            });
            serde_json::to_value(engine.search(&req, &token).await?)?
        }
        Cmd::Compile {
            plan,
            fields,
            unique_key,
            rows,
            start,
            dims,
        } => {
            let plan_text =
                std::fs::read_to_string(&plan).with_context(|| format!("reading {plan}"))?;
            let fields_text =
                std::fs::read_to_string(&fields).with_context(|| format!("reading {fields}"))?;
            let fc = FieldCatalog::new(unique_key, load_fields(&fields_text)?, None);
            compile_offline(&plan_text, &fc, rows, start, dims)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Accepts a bare field array or a schema/fields response.
fn load_fields(text: &str) -> Result<Vec<FieldDescriptor>> {
    let v: Value = serde_json::from_str(text).context("fields file is not JSON")?;
    let arr = match v {
        Value::Object(mut m) => m.remove("fields").unwrap_or(Value::Null),
        other => other,
    };
    serde_json::from_value(arr).context("expected an array of {name, type} objects")
}

fn compile_offline(
    plan_text: &str,
    fc: &FieldCatalog,
    rows: usize,
    start: usize,
    dims: usize,
) -> Result<Value> {
    let compiler = Compiler::new(CompileOptions::default());
    let plan = Plan::parse(plan_text, compiler.opts.default_k)?.plan;
    plan.validate()?;
    let zero = vec![0.0f32; dims];
    let out = match plan.mode {
        SearchMode::Keyword => json!({
            "mode": plan.mode,
            "params": compiler.keyword_params(&plan, fc, rows, start),
        }),
        SearchMode::Vector => json!({
            "mode": plan.mode,
            "body": compiler.vector_body(&plan, fc, &zero, rows, start),
        }),
        SearchMode::Hybrid => json!({
            "mode": plan.mode,
            "candidate_body": compiler.candidate_body(&plan, fc, &zero, rows),
            "params": compiler.keyword_params(&plan, fc, rows, start),
        }),
    };
    Ok(json!({"guessed": fc.guessed, "compiled": out}))
}
