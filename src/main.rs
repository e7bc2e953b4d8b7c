use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

use commission_flow::model::ReferenceImage;
use commission_flow::workflow::SubmissionOutcome;
use commission_flow::{HttpTransport, PaymentConfig, TransportConfig, Workflow};

#[derive(Debug, Parser)]
struct Args {
    /// JSON file describing the order: name, email, size, details, photo path.
    draft: PathBuf,

    /// Order submission endpoint.
    #[clap(long, env = "ORDER_ENDPOINT", default_value = "http://localhost:3000/api/order")]
    endpoint: Url,

    /// Payment gateway merchant id; omit (or "TEST") for simulation mode.
    #[clap(long, env = "MERCHANT_ID")]
    merchant_id: Option<String>,

    /// Payment gateway merchant secret; required with a real merchant id.
    #[clap(long, env = "MERCHANT_SECRET", hide_env_values = true)]
    merchant_secret: Option<String>,

    /// Public site origin used to derive the gateway redirect URLs.
    #[clap(long, env = "SITE_ORIGIN", default_value = "http://localhost:3000")]
    site_origin: Url,

    /// Timeout for the upload request.
    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    http_timeout: Duration,
}

/// On-disk description of an order draft.
#[derive(Debug, Deserialize)]
struct DraftFile {
    name: String,
    email: String,
    size: String,
    #[serde(default)]
    details: String,
    photo: PathBuf,
}

fn content_type_for(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        // let validation report the unsupported format
        _ => "application/octet-stream",
    }
    .to_string()
}

fn print_errors(workflow: &Workflow) {
    if let Some(message) = workflow.form_error() {
        println!("error: {message}");
    }
    for field in workflow.field_errors().fields() {
        for message in workflow.field_errors().messages(field) {
            println!("error: {field}: {message}");
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let raw = fs::read_to_string(&args.draft).expect("failed to read draft file");
    let file: DraftFile = serde_json::from_str(&raw).expect("invalid draft file");
    let bytes = fs::read(&file.photo).expect("failed to read reference photo");

    let payment = PaymentConfig::with_site_origin(
        args.merchant_id,
        args.merchant_secret,
        &args.site_origin,
    )
    .expect("invalid site origin");
    let mut workflow = match Workflow::new(payment) {
        Ok(workflow) => workflow,
        Err(e) => {
            // operators get the detail; the customer-facing message stays generic
            error!(error = %e, "payment configuration rejected");
            eprintln!("Ordering is currently unavailable. Please try again later.");
            process::exit(2);
        }
    };
    let transport = HttpTransport::new(&TransportConfig {
        endpoint: args.endpoint,
        timeout: args.http_timeout,
    })
    .expect("failed to build http client");

    // Fill the wizard the way the form would, one step at a time.
    {
        let draft = workflow.draft_mut();
        draft.name = file.name;
        draft.email = file.email;
        draft.size = file.size.parse().ok();
        draft.details = file.details;
        draft.reference_image = Some(ReferenceImage {
            file_name: file
                .photo
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo".to_string()),
            content_type: content_type_for(&file.photo),
            bytes,
        });
    }
    for _ in 0..3 {
        if workflow.next().is_err() {
            print_errors(&workflow);
            process::exit(1);
        }
    }

    let draft = workflow.draft();
    println!("Order summary");
    println!("  name:    {}", draft.name);
    println!("  email:   {}", draft.email);
    if let Some(size) = draft.size {
        println!("  size:    {size}");
        println!("  total:   LKR {}", size.price());
    }
    println!(
        "  details: {}",
        if draft.details.is_empty() { "None" } else { draft.details.as_str() }
    );

    let (progress_tx, progress_rx) = watch::channel(0u8);
    let printer = tokio::spawn(async move {
        let mut updates = WatchStream::new(progress_rx);
        while let Some(percent) = updates.next().await {
            info!(percent, "upload progress");
        }
    });

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = workflow
        .run_submission(&transport, &progress_tx, &mut cancel_rx)
        .await;
    drop(progress_tx);
    let _ = printer.await;

    match outcome {
        Ok(SubmissionOutcome::Succeeded { order_id }) => {
            println!("Payment complete. Order {order_id} confirmed.");
        }
        Ok(SubmissionOutcome::AwaitingRedirect(request)) => {
            println!("Order {} created; complete payment at the gateway:", request.order_id);
            println!(
                "{}",
                serde_json::to_string_pretty(&request).expect("payment request serializes")
            );
        }
        Ok(SubmissionOutcome::Failed) | Err(_) => {
            print_errors(&workflow);
            process::exit(1);
        }
        Ok(SubmissionOutcome::Cancelled) => {
            println!("Order cancelled.");
            process::exit(130);
        }
    }
}
