mod logging;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use postbook_client::{
    ClientConfig, Comment, CommentListController, ErrorKind, FeedConfig, Post, Postbook,
    PostbookError,
};
use session::SessionStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Browse and comment on the Postbook feed", long_about = None)]
struct Cli {
    /// Base URL of the REST resource (overrides POSTBOOK_API_URL)
    #[arg(short, long, global = true)]
    api_url: Option<String>,

    /// Where the signed-in user id is remembered
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in as an existing user
    Login {
        #[arg(short, long)]
        user_id: i64,
    },

    Logout,

    Whoami,

    /// Show one page of the feed
    Feed {
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },

    /// Show the comments of a post
    Comments {
        #[arg(short, long)]
        post: i64,

        /// How many times to press "show more"
        #[arg(short, long, default_value_t = 0)]
        more: usize,
    },

    /// Create a post
    Post {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        body: String,
    },

    /// Add a comment to a post
    Comment {
        #[arg(short, long)]
        post: i64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        body: String,
    },

    EditComment {
        #[arg(short, long)]
        post: i64,

        #[arg(short, long)]
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        body: String,
    },

    DeleteComment {
        #[arg(short, long)]
        post: i64,

        #[arg(short, long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    let mut client_config = ClientConfig::from_env().context("Invalid client configuration")?;
    if let Some(url) = cli.api_url {
        client_config = client_config.with_base_url(url);
    }
    let feed_config = FeedConfig::from_env().context("Invalid feed configuration")?;

    let postbook =
        Postbook::new(&client_config, feed_config).context("Failed to create Postbook client")?;
    let sessions = SessionStore::new(cli.session_file)?;

    match cli.command {
        Commands::Login { user_id } => {
            println!("🔑 Signing in as user #{}", user_id);
            let user = postbook.sign_in(user_id).await.unwrap_or_else(|e| fail(e));
            sessions.save_user_id(user.id)?;
            println!("{}", "✅ Signed in".green());
            println!("   Name: {}", user.name);
            println!("   Username: {}", user.username);
            println!("   Email: {}", user.email);
        }

        Commands::Logout => {
            if sessions.clear()? {
                println!("{}", "✅ Signed out".green());
            } else {
                println!("No session to clear");
            }
        }

        Commands::Whoami => {
            restore_session(&postbook, &sessions).await?;
            match postbook.current_user() {
                Some(user) => {
                    println!("👤 {} <{}>", user.username, user.email);
                    println!("   User ID: {}", user.id);
                    println!("   Session: {:?}", sessions.path());
                }
                None => {
                    println!("Not signed in");
                    println!("   Use: postbook login --user-id <id>");
                }
            }
        }

        Commands::Feed { page } => {
            let feed = postbook.feed();
            feed.load().await.unwrap_or_else(|e| fail(e));
            let shown = feed.go_to_page(page.saturating_sub(1));

            println!(
                "📋 Feed page {}/{} ({} posts)",
                shown + 1,
                feed.page_count(),
                feed.len()
            );
            println!();
            for post in feed.visible_slice() {
                print_post(&post);
            }
        }

        Commands::Comments { post, more } => {
            let comments = postbook.comments(post);
            comments.load().await.unwrap_or_else(|e| fail(e));
            for _ in 0..more {
                comments.show_more();
            }
            print_comments(&comments);
        }

        Commands::Post { title, body } => {
            restore_session(&postbook, &sessions).await?;
            let feed = postbook.feed();

            println!("📝 Creating post...");
            let post = feed.create_post(title, body).await.unwrap_or_else(|e| fail(e));
            println!("{}", "✅ Post created".green());
            print_post(&post);
        }

        Commands::Comment { post, name, body } => {
            let comments = signed_in_comments(&postbook, &sessions, post).await?;

            println!("💬 Commenting on post #{}...", post);
            comments
                .create_comment(name, body)
                .await
                .unwrap_or_else(|e| fail(e));
            println!("{}", "✅ Comment added".green());
            print_comments(&comments);
        }

        Commands::EditComment {
            post,
            id,
            name,
            body,
        } => {
            let comments = signed_in_comments(&postbook, &sessions, post).await?;

            println!("✏️ Updating comment #{}...", id);
            let comment = comments
                .update_comment(id, name, body)
                .await
                .unwrap_or_else(|e| fail(e));
            println!("{}", "✅ Comment updated".green());
            print_comment(&comments, &comment);
        }

        Commands::DeleteComment { post, id } => {
            let comments = signed_in_comments(&postbook, &sessions, post).await?;

            println!("🗑️ Deleting comment #{}...", id);
            comments.delete_comment(id).await.unwrap_or_else(|e| fail(e));
            println!("{}", "✅ Comment deleted".green());
            print_comments(&comments);
        }
    }

    Ok(())
}

async fn restore_session(postbook: &Postbook, sessions: &SessionStore) -> Result<()> {
    if let Some(user_id) = sessions.load_user_id()? {
        postbook
            .sign_in(user_id)
            .await
            .with_context(|| format!("Failed to restore session for user #{}", user_id))?;
    }
    Ok(())
}

/// Restores the session, refuses anonymous users before any request, then
/// loads the comments so mutations land in the list as it is displayed.
async fn signed_in_comments(
    postbook: &Postbook,
    sessions: &SessionStore,
    post_id: i64,
) -> Result<CommentListController> {
    restore_session(postbook, sessions).await?;
    if let Err(e) = postbook.user_context().require() {
        fail(e);
    }

    let comments = postbook.comments(post_id);
    comments.load().await.unwrap_or_else(|e| fail(e));
    Ok(comments)
}

fn fail(error: PostbookError) -> ! {
    match error.kind() {
        ErrorKind::AuthorizationRequired => {
            println!("{}", "❌ You need to login first:".red());
            println!("   postbook login --user-id <id>");
        }
        ErrorKind::NetworkOrServer if error.is_not_found() => {
            println!("{} {}", "❌ Not found:".red(), error);
        }
        ErrorKind::NetworkOrServer => {
            println!("{} {}", "❌ Request failed:".red(), error);
        }
        ErrorKind::Validation | ErrorKind::Logic => {
            println!("{} {}", "❌".red(), error);
        }
    }
    std::process::exit(1);
}

fn print_post(post: &Post) {
    println!("   [{}] {}", post.id, post.title.bold());
    println!("      {}", truncate(&post.body, 60));
    println!();
}

fn print_comment(comments: &CommentListController, comment: &Comment) {
    let marker = if comments.can_modify(comment) {
        " (yours)"
    } else {
        ""
    };
    println!(
        "   [{}] {}{}",
        comment.id,
        comment.name.as_deref().unwrap_or("(untitled)").bold(),
        marker.dimmed()
    );
    println!("      by {}", comment.author_handle());
    println!("      {}", truncate(&comment.body, 60));
}

fn print_comments(comments: &CommentListController) {
    println!(
        "💬 {} comments on post #{}",
        comments.len(),
        comments.post_id()
    );
    println!();
    for comment in comments.visible_slice() {
        print_comment(comments, &comment);
        println!();
    }
    if comments.has_more() {
        println!(
            "   ... {} more (use --more)",
            comments.hidden_count()
        );
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
