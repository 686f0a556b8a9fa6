pub mod annotate;
pub mod coordinate;
pub mod die;
pub mod orf;
mod pipeline;
pub mod unify;

pub use pipeline::{require_genome, run_gene_pipeline, PipelineParams};

const NA: &str = "NA";

fn format_float(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{:.3}", v),
        _ => NA.to_string(),
    }
}

fn format_p_value(p: f64) -> String {
    if p.is_nan() {
        NA.to_string()
    } else {
        format!("{:.3e}", p)
    }
}
