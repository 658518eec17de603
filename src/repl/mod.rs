//! Interactive REPL for Nimbus
//!
//! Provides a readline-based interface with:
//! - Command history
//! - Live todo listing backed by the synchronized store
//! - Streaming assistant replies
//! - Recipe and haiku generation

pub mod colors;
mod helper;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::io::{self, Write};
use std::sync::Arc;

use crate::ai::{GenerationPhase, Role, SessionError};
use crate::client::Client;

use helper::NimbusHelper;

/// REPL state
pub struct Repl {
    /// Readline editor with history and completion
    editor: Editor<NimbusHelper, DefaultHistory>,
    /// Connected client core
    client: Arc<Client>,
    /// History file path
    history_path: std::path::PathBuf,
}

impl Repl {
    pub fn new(client: Arc<Client>) -> Result<Self> {
        let mut editor = Editor::new()?;
        editor.set_helper(Some(NimbusHelper::new()));

        // History file in ~/.nimbus/history
        let history_path = dirs::home_dir()
            .unwrap_or_default()
            .join(".nimbus")
            .join("history");

        Ok(Self {
            editor,
            client,
            history_path,
        })
    }

    /// Load command history
    fn load_history(&mut self) {
        if self.history_path.exists() {
            let _ = self.editor.load_history(&self.history_path);
        }
    }

    /// Save command history
    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = self.editor.save_history(&self.history_path);
    }

    /// Run the REPL loop
    pub async fn run(&mut self) -> Result<()> {
        self.load_history();

        println!("Type a message to chat (Ctrl+D to exit, /help for commands)");
        println!();

        loop {
            let line = match self.editor.readline(">>> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            self.editor.add_history_entry(&line)?;

            if trimmed.starts_with('/') {
                if !self.handle_command(trimmed).await? {
                    break;
                }
                continue;
            }

            // Plain input goes to the assistant
            self.chat(trimmed).await?;
        }

        println!("Goodbye!");
        self.save_history();
        Ok(())
    }

    /// Handle a slash command. Returns false when the REPL should exit.
    async fn handle_command(&mut self, input: &str) -> Result<bool> {
        let mut parts = input.splitn(2, ' ');
        let command = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match command {
            "/help" => self.show_help(),
            "/list" => self.show_todos(),
            "/add" => {
                match self.client.gateway().create(rest).await {
                    Ok(record) => println!(
                        "{} {}",
                        colors::success("Added"),
                        colors::record_id(&record.id)
                    ),
                    Err(e) => println!("{}", colors::error(&format!("Add failed: {}", e))),
                }
            }
            "/rm" => {
                if rest.is_empty() {
                    println!("{}", colors::warning("Usage: /rm <id>"));
                } else {
                    match self.client.gateway().delete(rest).await {
                        Ok(()) => println!("{} {}", colors::success("Removed"), rest),
                        Err(e) => {
                            println!("{}", colors::error(&format!("Remove failed: {}", e)))
                        }
                    }
                }
            }
            "/recipe" => self.generate_recipe(rest).await,
            "/haiku" => match self.client.haiku(rest).await {
                Ok(haiku) => println!("{}", haiku),
                Err(e) => println!("{}", colors::error(&format!("Haiku failed: {}", e))),
            },
            "/files" => self.show_files(),
            "/upload" => self.upload(rest).await,
            "/refresh" => match self.client.files().refresh().await {
                Ok(()) => self.show_files(),
                Err(e) => println!("{}", colors::error(&format!("Refresh failed: {}", e))),
            },
            "/resubscribe" => match self.client.resubscribe().await {
                Ok(()) => println!("{}", colors::success("Resubscribed")),
                Err(e) => println!("{}", colors::error(&format!("Resubscribe failed: {}", e))),
            },
            "/whoami" => {
                let session = self.client.session();
                println!("{} ({})", session.username, session.user_id);
                println!("{}", colors::status(&session.storage_prefix()));
            }
            "/quit" | "/exit" => return Ok(false),
            _ => println!(
                "{}",
                colors::warning(&format!("Unknown command: {} (try /help)", command))
            ),
        }
        Ok(true)
    }

    fn show_help(&self) {
        println!("{}", colors::header("Commands:"));
        println!("  /list              Show todos");
        println!("  /add <content>     Add a todo");
        println!("  /rm <id>           Delete a todo");
        println!("  /recipe <desc>     Generate a recipe");
        println!("  /haiku <prompt>    Generate a haiku");
        println!("  /files             Show cached file listing");
        println!("  /upload <path>     Upload a local file");
        println!("  /refresh           Re-list files");
        println!("  /resubscribe       Re-open the todo subscription");
        println!("  /whoami            Show the signed-in user");
        println!("  /quit              Exit");
        println!();
        println!("Anything else is sent to the assistant.");
    }

    fn show_todos(&self) {
        let todos = self.client.store().visible();
        if todos.is_empty() {
            println!("{}", colors::status("No todos."));
            return;
        }
        for todo in todos {
            let marker = if todo.is_done { "[x]" } else { "[ ]" };
            println!(
                "  {} {} {}",
                marker,
                colors::record_id(&todo.id),
                todo.content
            );
        }
    }

    fn show_files(&self) {
        let entries = self.client.files().entries();
        if entries.is_empty() {
            println!("{}", colors::status("No files."));
            return;
        }
        for entry in entries {
            println!("  {}", colors::file_key(&entry.key));
        }
    }

    async fn upload(&self, path: &str) {
        if path.is_empty() {
            println!("{}", colors::warning("Usage: /upload <path>"));
            return;
        }
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("{}", colors::error(&format!("Cannot read {}: {}", path, e)));
                return;
            }
        };
        let name = std::path::Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());

        match self.client.files().upload(&name, bytes).await {
            Ok(()) => println!("{} {}", colors::success("Uploaded"), colors::file_key(&name)),
            Err(e) => println!("{}", colors::error(&format!("Upload failed: {}", e))),
        }
    }

    /// Send one message and print the reply as it streams
    async fn chat(&self, text: &str) -> Result<()> {
        let session = Arc::clone(self.client.conversation());
        let mut turns_rx = session.subscribe();

        let mut driver = {
            let session = Arc::clone(&session);
            let text = text.to_string();
            tokio::spawn(async move { session.send_message(&text).await })
        };

        let mut printed = 0usize;
        let outcome = loop {
            tokio::select! {
                changed = turns_rx.changed() => {
                    if changed.is_err() {
                        break driver.await?;
                    }
                    let turns = turns_rx.borrow_and_update().clone();
                    if let Some(turn) = turns.last() {
                        if turn.role == Role::Assistant && turn.content.len() > printed {
                            print!("{}", &turn.content[printed..]);
                            io::stdout().flush()?;
                            printed = turn.content.len();
                        }
                    }
                }
                res = &mut driver => {
                    break res?;
                }
            }
        };

        // Print whatever arrived after the last observed change.
        if let Some(turn) = session.turns().last() {
            if turn.role == Role::Assistant && turn.content.len() > printed {
                print!("{}", &turn.content[printed..]);
            }
        }
        println!();

        match outcome {
            Ok(()) => {}
            Err(SessionError::Busy) => {
                println!("{}", colors::warning("A reply is already streaming."))
            }
            Err(e) => println!("{}", colors::error(&format!("Chat failed: {}", e))),
        }
        Ok(())
    }

    /// Request a recipe and wait for the view to settle
    async fn generate_recipe(&self, description: &str) {
        let generator = self.client.generator();
        let mut view_rx = generator.subscribe();

        if let Err(e) = generator.request(description.to_string()) {
            println!("{}", colors::error(&format!("Recipe failed: {}", e)));
            return;
        }

        let view = loop {
            let view = view_rx.borrow_and_update().clone();
            if view.phase == GenerationPhase::Idle && (view.result.is_some() || view.error.is_some())
            {
                break view;
            }
            if view_rx.changed().await.is_err() {
                return;
            }
        };

        if let Some(error) = view.error {
            println!("{}", colors::error(&format!("Recipe failed: {}", error)));
            return;
        }
        if let Some(recipe) = view.result {
            println!("{}", colors::header(&recipe.name));
            for ingredient in &recipe.ingredients {
                println!("  - {}", ingredient);
            }
            println!();
            println!("{}", recipe.instructions);
        }
    }
}
