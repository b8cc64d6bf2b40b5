use std::time::Duration;
use clap::{Arg, ArgMatches, Command};
use swarmsim::driver::AutoPlayDriver;
use swarmsim::logging::{init_logging, parse_log_level, LogConfig, LogOutput};
use swarmsim::models::SwarmMode;
use swarmsim::scenario::ScenarioConfig;
use swarmsim::simulation::{RunSummary, SimulationEngine};

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("swarmsim")
        .version("0.1.0")
        .about("スウォーム迎撃シミュレーション (Swarm Interception Simulation)")
        .long_about("徘徊型ミサイル群による移動目標迎撃のエージェントベースシミュレーション\n\
                     離散ティック駆動で各スウォーム戦術の効果を比較します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、組み込みの標準シナリオで実行されます。")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .value_parser(clap::value_parser!(SwarmMode))
                .help("スウォームモードを上書き (independent, saturation, pulse_wave, recon_led, multi_axis, decoy, learned)")
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(clap::value_parser!(u64))
                .help("乱数シードを上書き")
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .help("最大ティック数を上書き")
        )
        .arg(
            Arg::new("missiles")
                .long("missiles")
                .value_name("N")
                .value_parser(clap::value_parser!(u32))
                .help("発射総数を上書き")
        )
        .arg(
            Arg::new("autoplay-ms")
                .long("autoplay-ms")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("指定したミリ秒周期で1ティックずつ自動再生")
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .action(clap::ArgAction::SetTrue)
                .help("終了時のスナップショットをYAMLで出力")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .value_parser(clap::value_parser!(LogOutput))
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。未指定なら -v の回数で決定")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log-level")
            .map(|level| parse_log_level(level))
            .unwrap_or_else(|| LogConfig::level_for_verbosity(verbose_level)),
        output: matches.get_one::<LogOutput>("log-output").copied().unwrap_or(LogOutput::Console),
        ..LogConfig::default()
    };
    if let Err(e) = init_logging(log_config) {
        eprintln!("ログ初期化エラー: {}", e);
    }

    println!("スウォーム迎撃シミュレーション - swarmsim v0.1.0");
    println!();

    if let Err(e) = run(&matches, verbose_level) {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// シナリオを読み込み、上書きを適用して実行
fn run(matches: &ArgMatches, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    let mut scenario = match matches.get_one::<String>("scenario") {
        Some(path) => {
            let scenario = ScenarioConfig::from_file(path)?;
            if verbose_level > 0 {
                println!("シナリオファイル読み込み完了: {}", path);
            }
            scenario
        }
        None => {
            println!("シナリオ未指定のため標準シナリオを使用します (-s <FILE> で指定)");
            ScenarioConfig::default()
        }
    };

    apply_overrides(&mut scenario, matches);
    scenario.validate()?;

    scenario.print_summary();
    println!();

    if matches.get_flag("info") {
        return Ok(());
    }

    let mut engine = SimulationEngine::new(scenario, verbose_level);
    engine.initialize()?;
    println!("シード値: {}", engine.seed);

    let summary = match matches.get_one::<u64>("autoplay-ms") {
        Some(period_ms) => autoplay(&mut engine, Duration::from_millis(*period_ms))?,
        None => engine.run()?,
    };

    print_summary(&summary);

    if matches.get_flag("snapshot") {
        println!();
        println!("{}", engine.snapshot().to_yaml()?);
    }

    Ok(())
}

fn apply_overrides(scenario: &mut ScenarioConfig, matches: &ArgMatches) {
    if let Some(mode) = matches.get_one::<SwarmMode>("mode") {
        scenario.swarm.mode = *mode;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        scenario.sim.seed = Some(*seed);
    }
    if let Some(ticks) = matches.get_one::<u64>("ticks") {
        scenario.sim.max_ticks = *ticks;
    }
    if let Some(missiles) = matches.get_one::<u32>("missiles") {
        scenario.swarm.missile_count = *missiles;
    }
}

/// 自動再生（1ティックごとに進行状況を表示）
fn autoplay(engine: &mut SimulationEngine, period: Duration) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()?;

    let (driver, _handle) = AutoPlayDriver::new(period);
    let summary = runtime.block_on(driver.run(engine, |snapshot| {
        println!(
            "tick {:>5}: 生存 {:>3}機 / 命中 {:>3}機",
            snapshot.tick,
            snapshot.active_missiles(),
            snapshot.exploded_missiles()
        );
    }));

    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("=== 実行結果 ===");
    println!("ティック数: {}", summary.ticks);
    println!("発射数: {}発", summary.launched);
    println!("命中: {}発", summary.hits);
    println!("燃料切れ: {}発", summary.fuel_exhausted);
    println!("自爆（デコイ）: {}発", summary.self_destructs);
    if summary.guidance_failures > 0 {
        println!("誘導失敗: {}発", summary.guidance_failures);
    }
    println!("飛翔中: {}発", summary.active);
    println!("メッセージ配信数: {}", summary.messages_delivered);
}
