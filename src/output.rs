use colored::*;
use sse::{ConnectionStatus, Message};

pub fn print_banner(urls: &[String]) {
    println!("{}", "=== SSE WATCH ===".bright_white().bold());
    for url in urls {
        println!("{} {}", "→".blue(), url);
    }
}

pub fn print_message(url: &str, message: &Message) {
    let id = if message.id.is_empty() {
        String::new()
    } else {
        format!(" #{}", message.id)
    };

    println!(
        "\n[{}] {} event received{}",
        url.bright_blue().bold(),
        message.event.yellow(),
        id.dimmed()
    );

    match message.json::<serde_json::Value>() {
        Ok(value) => {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                println!("   {}", pretty.dimmed());
            }
        }
        Err(_) => println!("   {}", message.data.dimmed()),
    }
}

pub fn print_status(url: &str, status: ConnectionStatus) {
    let label = match status {
        ConnectionStatus::Idle => status.as_str().white(),
        ConnectionStatus::Connecting => status.as_str().yellow(),
        ConnectionStatus::Connected => status.as_str().green().bold(),
        ConnectionStatus::Error => status.as_str().red().bold(),
    };

    println!("[{}] status {}", url.bright_blue().bold(), label);
}
