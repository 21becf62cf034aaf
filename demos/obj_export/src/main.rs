use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use smplrig::smplrig_core::common::body::Body;
use smplrig::smplrig_core::common::sequence::Sequence;
use smplrig::smplrig_core::common::smpl_model::SmplModel;
use smplrig::smplrig_core::common::types::{Gender, SmplVariant};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Pose a SMPL-family body and export the mesh as OBJ")]
struct Args {
    /// Model variant: smpl, smplh, smplx or smplx-pca
    #[arg(long, default_value = "smplx")]
    variant: String,

    /// Model gender: neutral, male or female
    #[arg(long, default_value = "neutral")]
    gender: String,

    /// Model npz path; defaults to the resolved data directory
    #[arg(long)]
    model: Option<PathBuf>,

    /// UV side-car file to load alongside an explicit model path
    #[arg(long)]
    uv: Option<PathBuf>,

    /// AMASS sequence npz whose frame should drive the body
    #[arg(long)]
    sequence: Option<PathBuf>,

    /// Frame of the sequence to bind
    #[arg(long, default_value_t = 0)]
    frame: usize,

    /// Root translation applied to the body, as x,y,z
    #[arg(long)]
    trans: Option<String>,

    /// Output OBJ path
    #[arg(long, default_value = "body.obj")]
    out: PathBuf,
}

fn parse_variant(text: &str) -> Result<SmplVariant> {
    Ok(match text {
        "smpl" => SmplVariant::Smpl,
        "smplh" => SmplVariant::SmplH,
        "smplx" => SmplVariant::SmplX,
        "smplx-pca" => SmplVariant::SmplXPca,
        other => bail!("unknown variant '{other}'"),
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let variant = parse_variant(&args.variant)?;
    let gender = Gender::parse(&args.gender);
    let model = match &args.model {
        Some(path) => SmplModel::new_from_npz(variant, path, args.uv.as_deref(), gender)
            .with_context(|| format!("loading model from {}", path.display()))?,
        None => SmplModel::new_from_gender(variant, gender).context("loading default model")?,
    };

    let mut body = Body::new(&model);
    if let Some(sequence_path) = &args.sequence {
        let sequence = Sequence::new_from_npz(sequence_path);
        if sequence.is_empty() {
            bail!("sequence {} is empty", sequence_path.display());
        }
        info!(
            "sequence: {} frames at {} fps, gender {}",
            sequence.n_frames, sequence.frame_rate, sequence.gender
        );
        sequence.set_shape(&mut body)?;
        sequence.set_pose(&mut body, args.frame)?;
    }
    if let Some(trans) = &args.trans {
        let parts: Vec<f32> = trans
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .context("parsing --trans")?;
        if parts.len() != 3 {
            bail!("--trans expects three comma-separated numbers");
        }
        for (dst, &src) in body.trans_mut().iter_mut().zip(parts.iter()) {
            *dst = src;
        }
    }

    let start = std::time::Instant::now();
    body.update();
    info!("update took {:?}", start.elapsed());

    body.save_obj(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!("wrote {}", args.out.display());
    Ok(())
}
