use clap::Parser;
use student_criteria::utils::error::ErrorSeverity;
use student_criteria::utils::{logger, validation::Validate};
use student_criteria::{
    CliConfig, ServiceOptions, SqliteBackend, StudentQueryService, TomlConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 合併設定檔與命令列參數
    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(config.log_format(), config.verbose());

    tracing::info!("Starting student-criteria: {}", cli.command.name());
    tracing::debug!("Effective config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let outcome = run(&cli, &config).await;

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Err(e) => {
            tracing::error!(
                "❌ Query failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 4,      // 查無資料或結果不唯一
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3, // 資料庫錯誤
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &CliConfig, config: &TomlConfig) -> student_criteria::Result<serde_json::Value> {
    // 只有空資料表才會匯入 seed CSV
    let backend = SqliteBackend::from_config(config).await?;

    let service = StudentQueryService::with_options(backend, ServiceOptions::from_config(config));
    cli.command.execute(&service).await
}
