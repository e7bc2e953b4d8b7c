use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use url::Url;

use commission_flow::model::{DrawingSize, ReferenceImage};
use commission_flow::validate;
use commission_flow::workflow::Step;
use commission_flow::{Amount, OrderDraft, PaymentConfig, PaymentSigner, Workflow};

fn payment_config(merchant_id: Option<&str>, secret: Option<&str>) -> PaymentConfig {
    PaymentConfig::with_site_origin(
        merchant_id.map(String::from),
        secret.map(String::from),
        &Url::parse("http://localhost:3000").unwrap(),
    )
    .unwrap()
}

fn draft_with_photo(photo_len: usize) -> OrderDraft {
    OrderDraft {
        name: "Jane Doe".to_string(),
        email: "jane@x.com".to_string(),
        size: Some(DrawingSize::A3),
        details: "From the beach photo".to_string(),
        reference_image: Some(ReferenceImage {
            file_name: "cat.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![7u8; photo_len],
        }),
    }
}

fn bench_signing(c: &mut Criterion) {
    let signer =
        PaymentSigner::from_config(&payment_config(Some("1221149"), Some("sandbox-secret")))
            .unwrap();

    c.bench_function("sign_production", |b| {
        b.iter(|| signer.sign(black_box("ord_42"), black_box(Amount::from_major(8000))))
    });
}

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    let valid = draft_with_photo(1024);
    group.bench_function("valid_draft", |b| {
        b.iter(|| validate::validate_all(black_box(&valid)))
    });

    let invalid = OrderDraft::default();
    group.bench_function("empty_draft", |b| {
        b.iter(|| validate::validate_step(black_box(&invalid), Step::Contact))
    });

    group.finish();
}

fn bench_wizard(c: &mut Criterion) {
    let mut group = c.benchmark_group("wizard");

    // snapshotting the draft at submission dominates, so scale the photo
    for photo_kib in [16usize, 1024, 4096] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{photo_kib}KiB_photo")),
            &photo_kib,
            |b, &photo_kib| {
                let draft = draft_with_photo(photo_kib * 1024);
                b.iter(|| {
                    let mut workflow = Workflow::new(payment_config(None, None)).unwrap();
                    *workflow.draft_mut() = draft.clone();
                    for _ in 0..3 {
                        workflow.next().unwrap();
                    }
                    let (generation, _order) = workflow.begin_submission().unwrap();
                    workflow.upload_succeeded(generation, "ord_1".to_string());
                    workflow.payment_completed(generation);
                    workflow
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_signing, bench_validation, bench_wizard);
criterion_main!(benches);
