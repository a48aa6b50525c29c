use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use log::{error, info};

use gridsight::config::GridConfig;
use gridsight::gridsight::Gridsight;
use gridsight::{GridError, GridResult, OnnxEngine, Scanner, load_features};

/// 网格检测模型的后处理与调试工具
#[derive(Parser, Debug)]
#[command(name = "gridsight", version, long_about = None)]
struct Args {
    /// 逗号分隔的特征值，或包含特征值的文件；多个输入时批量处理
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// 配置文件路径（默认读取当前目录下的 gridsight.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// ONNX 模型路径，覆盖配置文件
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// 调试位图输出路径，覆盖配置文件
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 关闭诊断输出中的 ANSI 颜色
    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// 输出调试日志
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                return ExitCode::from(1);
            }
        },
    };

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> GridResult<()> {
    let mut config = GridConfig::discover(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.model.path = Some(model);
    }
    if let Some(output) = args.output {
        config.render.output = output;
    }
    if args.no_color {
        config.report.color = false;
    }

    let scanner = Scanner::from_config(&config);

    if let [input] = args.inputs.as_slice() {
        let features = load_features(input)?;
        features.expect_len(scanner.frame_size())?;

        let mut engine = OnnxEngine::from_config(&config.model)?;
        let mut out = io::stdout().lock();
        let outcome = scanner.run(&mut engine, &features, &mut out)?;
        info!(
            "完成: {} 个目标, 位图 {}x{} 已写入 {}",
            outcome.cubes.len(),
            outcome.width,
            outcome.height,
            outcome.output_path.display()
        );
        return Ok(());
    }

    run_batch(args.inputs, scanner, &config)
}

/// 多个输入时并行处理，位图写到输出路径所在目录
fn run_batch(inputs: Vec<String>, scanner: Scanner, config: &GridConfig) -> GridResult<()> {
    let output_dir = config
        .render
        .output
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let model = config.model.clone();
    let runner = Gridsight::new(scanner, move || OnnxEngine::from_config(&model), output_dir);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| GridError::Inference(format!("无法创建运行时: {}", e)))?;
    let items = runtime.block_on(runner.scan_all(inputs));

    let mut failed = 0;
    for item in &items {
        println!("==> {}", item.input);
        print!("{}", item.report);
        match &item.result {
            Ok(outcome) => info!("{}: {} 个目标 -> {}", item.input, outcome.cubes.len(), outcome.output_path.display()),
            Err(e) => {
                error!("{}: {}", item.input, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(GridError::Inference(format!("{}/{} 个输入处理失败", failed, items.len())));
    }
    Ok(())
}
