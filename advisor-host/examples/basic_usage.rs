use advisor_host::{
    ControllerConfig, EventEmitter, EventKind, McpToolProvider, OllamaTokenSource,
    PromptTemplate, ProviderRegistry, ToolDispatcher, TurnController,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

// cargo run --example basic_usage -- <tool-server> [args...]
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("advisor_host=debug,advisor_client=debug")
        .with_writer(std::io::stderr)
        .init();

    let mut registry = ProviderRegistry::new();
    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        let server_args: Vec<String> = args.collect();
        let mut client = advisor_client::McpClient::connect(&command, &server_args).await?;
        client.initialize("advisor-host-example", "0.1.0").await?;
        McpToolProvider::register_all(Arc::new(Mutex::new(client)), &mut registry).await?;
    }

    let system_prompt =
        PromptTemplate::new("You are a college admissions advisor.").render(&registry);
    let source = Arc::new(OllamaTokenSource::new("llama3.1:8b"));

    let (emitter, mut events) = EventEmitter::channel(32);
    let controller = TurnController::new(
        source,
        ToolDispatcher::new(registry),
        ControllerConfig::default(),
        emitter,
    )
    .with_system_prompt(system_prompt);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let content = event.content.unwrap_or_default();
            match event.kind {
                EventKind::Thinking => println!("(thinking) {}", content),
                EventKind::ToolCall => println!("-> {} {}", content, event.tool_data.unwrap_or_default()),
                EventKind::ToolResult => println!("<- {}", content),
                EventKind::Response => println!("Assistant: {}", content),
                EventKind::Error => println!("! {}", content),
                EventKind::Complete => println!("--"),
            }
        }
    });

    let question = "Which nursing programs in Massachusetts have rolling admissions?";
    println!("User: {}", question);
    let outcome = controller.run(question).await;
    printer.await?;

    println!("Finished as {:?} after {} turns", outcome.state, outcome.turns);
    Ok(())
}
