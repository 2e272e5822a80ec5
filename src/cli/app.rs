//! CLI module for the notably application
//!
//! Each client subcommand maps onto one action of the client [`Store`];
//! notifications the action raised are printed afterwards.
use std::io::{stdin, stdout, Write};

use log::debug;

use crate::{
    content_preview, filter_by_tags, filter_notes, note_keywords, parse_tags, suggest_tags,
    Commands, LoginInput, Note, NoteDraft, NotePatch, NotesBackend, NotesError, NotificationLevel,
    RegisterInput, Result, SessionStore, Store,
};

/// CLI Application handler - turns commands into client actions
pub struct App<B: NotesBackend, S: SessionStore> {
    store: Store<B, S>,

    /// Whether to display verbose output
    verbose: bool,
}

impl<B: NotesBackend, S: SessionStore> App<B, S> {
    pub fn new(store: Store<B, S>, verbose: bool) -> Self {
        Self { store, verbose }
    }

    /// Run one client command. Returns whether it succeeded.
    pub async fn run(&mut self, command: Commands) -> Result<bool> {
        let ok = match command {
            Commands::Serve { .. } => {
                return Err(NotesError::ApplicationError {
                    message: "serve is not a client command".to_string(),
                })
            }

            Commands::Register {
                name,
                email,
                password,
            } => {
                self.store
                    .register(RegisterInput {
                        name,
                        email,
                        password,
                    })
                    .await
            }

            Commands::Login { email, password } => {
                self.store.login(LoginInput { email, password }).await
            }

            Commands::Logout => {
                self.store.logout().await;
                true
            }

            Commands::ForgotPassword { email } => self.store.forgot_password(&email).await,

            Commands::List { json, brief } => self.list_notes(json, brief).await?,

            Commands::Search { query, limit, json } => {
                self.handle_search(&query, limit, json).await?
            }

            Commands::Create { title, body } => {
                self.store.create_note(NoteDraft::new(title, body)).await
            }

            Commands::Edit { id, title, body } => {
                self.store.update_note(&id, NotePatch { title, body }).await
            }

            Commands::Delete { id, force } => self.handle_delete(&id, force).await?,

            Commands::Tags { term, select } => self.handle_tags(term, select).await,
        };

        self.print_notifications();
        Ok(ok)
    }

    async fn list_notes(&mut self, json: bool, brief: bool) -> Result<bool> {
        if !self.store.get_notes().await {
            return Ok(false);
        }
        let notes = self.store.state().notes.notes.clone();
        self.display_notes(&notes, json, !brief)?;
        Ok(true)
    }

    async fn handle_search(&mut self, query: &str, limit: usize, json: bool) -> Result<bool> {
        if !self.store.get_notes().await {
            return Ok(false);
        }

        let mut results = filter_notes(&self.store.state().notes.notes, query);
        results.truncate(limit);
        debug!("Search '{}' returned {} notes", query, results.len());

        if results.is_empty() {
            println!("No notes found matching query: \"{}\"", query);
            return Ok(true);
        }
        self.display_notes(&results, json, false)?;
        Ok(true)
    }

    async fn handle_tags(&mut self, term: Option<String>, select: Option<String>) -> bool {
        if !self.store.get_notes().await {
            return false;
        }
        let notes = self.store.state().notes.notes.clone();
        let selected = parse_tags(select);

        if let Some(term) = term {
            let suggestions = suggest_tags(&notes, &term, &selected);
            if suggestions.is_empty() {
                println!("No keyword suggestions for \"{}\"", term);
            } else {
                println!("Suggestions: {}", console::style(suggestions.join(", ")).cyan());
            }
        }

        if !selected.is_empty() {
            let filtered = filter_by_tags(&notes, &selected);
            for note in &filtered {
                println!("{}  {}", note.id, console::style(&note.title).bold());
            }
            println!("\n{} of {} notes match", filtered.len(), notes.len());
        } else {
            for note in &notes {
                println!(
                    "{}  {}",
                    console::style(&note.title).bold(),
                    console::style(note_keywords(note).join(", ")).cyan()
                );
            }
        }
        true
    }

    async fn handle_delete(&mut self, id: &str, force: bool) -> Result<bool> {
        if !force {
            // Step 1: Fetch the note to be deleted, to show it in the prompt
            if !self.store.get_notes().await {
                return Ok(false);
            }
            let note = match self.store.state().notes.notes.iter().find(|n| n.id == id) {
                Some(note) => note.clone(),
                None => {
                    eprintln!("Note not found: {}", id);
                    return Ok(false);
                }
            };

            // Step 2: Show note details and prompt for confirmation
            println!("You are about to delete the following note:");
            println!("ID:      {}", note.id);
            println!("Title:   {}", note.title);
            println!("Created: {}", note.created_at.format("%Y-%m-%d %H:%M:%S"));

            let preview = content_preview(&note.body, 120);
            if !preview.is_empty() {
                println!("\nContent preview:\n{}", preview);
            }

            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this note? [y/N]: ");
            stdout().flush()?;

            let mut input = String::new();
            stdin().read_line(&mut input)?;

            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                println!("Deletion cancelled.");
                return Ok(true);
            }
        }

        // Step 3: Delete the note
        Ok(self.store.delete_note(id).await)
    }

    /// Display notes in the requested format
    fn display_notes(&self, notes: &[Note], json: bool, detailed: bool) -> Result<()> {
        if notes.is_empty() {
            println!("No notes yet.");
            return Ok(());
        }

        if json {
            println!("{}", serde_json::to_string_pretty(notes)?);
            return Ok(());
        }

        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let created_at = note.created_at.format("%Y-%m-%d %H:%M");
            println!("ID: {} | Created: {}", note.id, created_at);
            println!("Title: {}", console::style(&note.title).bold());

            if self.verbose {
                println!("Updated: {}", note.updated_at.format("%Y-%m-%d %H:%M:%S"));
            }

            if detailed {
                let preview = content_preview(&note.body, term_width.saturating_sub(4).max(20));
                if !preview.is_empty() {
                    println!("\n{}", preview);
                }
            }
        }

        println!(
            "\nFound {} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );
        Ok(())
    }

    fn print_notifications(&mut self) {
        for notification in self.store.take_notifications() {
            match notification.level {
                NotificationLevel::Success => {
                    println!("{}", console::style(notification.message).green())
                }
                NotificationLevel::Error => {
                    eprintln!("{}", console::style(notification.message).red())
                }
            }
        }
    }
}
