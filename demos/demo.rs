//! Create a throwaway inbox, wait for mail, then clean up.
//!
//! Run with `cargo run --example demo`, then send a message to the printed
//! address within two minutes.

use std::time::Duration;

use mailtm_client::{Auth, Client, Error, LiveState};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let client = Client::new()?;

    let domains = client.domains().await?;
    let Some(domain) = domains.iter().find(|d| d.is_active && !d.is_private) else {
        eprintln!("no public domain available");
        return Ok(());
    };

    let auth = Auth::random(&domain.domain);
    let account = client.create_account(&auth).await?;
    let token = client.login(&auth).await?;
    println!("Inbox: {}", account.address);

    let mut live = client.live_mail(&token, &account.id);
    let mut messages = live.messages();
    let mut states = live.state_changes();
    live.start();

    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("Live stream: {}", if state == LiveState::Open { "open" } else { "closed" });
        }
    });

    match tokio::time::timeout(Duration::from_secs(120), messages.recv()).await {
        Ok(Ok(summary)) => {
            let message = client.message(&token, &summary.id).await?;
            println!("From: {}", message.from.address);
            println!("Subject: {}", message.subject);
            println!("{}", message.text);
            client.mark_message_seen(&token, &message.id, true).await?;
        }
        Ok(Err(err)) => eprintln!("live stream ended: {err}"),
        Err(_) => println!("No mail received."),
    }

    live.stop();
    for message in client.messages(&token).await? {
        println!("[{}] {}", if message.seen { "read" } else { "new" }, message.subject);
    }

    client.delete_account(&account.id, &token).await?;
    println!("Deleted {}", account.address);
    Ok(())
}
