//! Integration tests: compose messages and read them back with a MIME parser.

use chrono::{TimeZone, Utc};
use mail_parser::{Message, MessageParser, MimeHeaders};

use mailcompose::{
    build_mail, complete_mail, compose_mail, Address, Attachment, CharsetPolicy, EmbeddedFile,
    FinalizeOptions, MailContent, MailError,
};

fn parse(payload: &[u8]) -> Message<'_> {
    MessageParser::default()
        .parse(payload)
        .expect("generated message should parse")
}

/// First text body, without the line break that ends the part.
fn body_text(msg: &Message<'_>) -> Option<String> {
    msg.body_text(0).map(|t| t.trim_end().to_string())
}

fn text(content: &str, charset: &str) -> Option<(String, String)> {
    Some((content.to_string(), charset.to_string()))
}

// ─── Test 1: Basic text message ─────────────────────────────────────

#[test]
fn test_basic_text_message() {
    let content = MailContent {
        text: text("Hello world", "us-ascii"),
        ..Default::default()
    };
    let mail = compose_mail(
        &("Me", "me@foo.com").into(),
        &[("Him", "him@bar.com").into()],
        "the subject",
        "iso-8859-1",
        &content,
        &FinalizeOptions::default(),
    )
    .unwrap();

    assert_eq!(mail.envelope.mail_from, "me@foo.com");
    assert_eq!(mail.envelope.rcpt_to, vec!["him@bar.com"]);

    let raw = String::from_utf8(mail.payload.clone()).unwrap();
    assert!(raw.lines().any(|l| l == "From: Me <me@foo.com>"));
    assert!(raw.lines().any(|l| l == "Hello world"));

    let msg = parse(&mail.payload);
    assert_eq!(msg.subject(), Some("the subject"));
    assert_eq!(body_text(&msg).as_deref(), Some("Hello world"));
    assert!(msg.date().is_some());
}

// ─── Test 2: Address lists decode in order ──────────────────────────

#[test]
fn test_address_lists_round_trip_in_order() {
    let to: Vec<Address> = vec![
        ("Foo", "foo@example.com").into(),
        "plain@example.com".into(),
        ("Léo Noël", "leo@example.com").into(),
        ("Doe, John", "john@example.com").into(),
    ];
    let options = FinalizeOptions {
        cc: vec![("M\u{101}ori", "maori@example.com").into()],
        ..Default::default()
    };
    let content = MailContent {
        text: text("body", "us-ascii"),
        ..Default::default()
    };
    let mail = compose_mail(
        &"me@foo.com".into(),
        &to,
        "s",
        "iso-8859-1",
        &content,
        &options,
    )
    .unwrap();
    let msg = parse(&mail.payload);

    let decoded = msg.to().and_then(|a| a.as_list()).expect("To header");
    let pairs: Vec<(Option<&str>, Option<&str>)> =
        decoded.iter().map(|a| (a.name(), a.address())).collect();
    assert_eq!(
        pairs,
        vec![
            (Some("Foo"), Some("foo@example.com")),
            (None, Some("plain@example.com")),
            (Some("Léo Noël"), Some("leo@example.com")),
            (Some("Doe, John"), Some("john@example.com")),
        ]
    );

    let cc = msg.cc().and_then(|a| a.as_list()).expect("Cc header");
    assert_eq!(cc[0].name(), Some("M\u{101}ori"));
    assert_eq!(cc[0].address(), Some("maori@example.com"));
}

// ─── Test 3: Non-ASCII subject ──────────────────────────────────────

#[test]
fn test_non_ascii_subject_decodes() {
    for charset in ["iso-8859-1", "utf-8"] {
        let content = MailContent {
            text: text("x", "us-ascii"),
            ..Default::default()
        };
        let subject = "Réunion: café à 10h, « ordre du jour » très détaillé pour tous les participants";
        let mail = compose_mail(
            &"me@foo.com".into(),
            &[],
            subject,
            charset,
            &content,
            &FinalizeOptions::default(),
        )
        .unwrap();
        let msg = parse(&mail.payload);
        assert_eq!(msg.subject(), Some(subject), "charset {charset}");
    }
}

// ─── Test 4: Non-ASCII attachment filename with quoted-printable ────

#[test]
fn test_non_ascii_filename_and_quoted_printable() {
    let attachment = Attachment::new(b"%PDF-1.4 fake".to_vec())
        .with_mime_type("application", "pdf")
        .with_filename("résumé été.pdf");
    let content = MailContent {
        text: text("Voilà le résumé", "utf-8"),
        attachments: vec![attachment.into()],
        use_quoted_printable: true,
        ..Default::default()
    };
    let mail = compose_mail(
        &"me@foo.com".into(),
        &["him@bar.com".into()],
        "cv",
        "utf-8",
        &content,
        &FinalizeOptions::default(),
    )
    .unwrap();

    let raw = String::from_utf8_lossy(&mail.payload);
    assert!(raw.contains("Content-Transfer-Encoding: quoted-printable"));

    let msg = parse(&mail.payload);
    assert_eq!(body_text(&msg).as_deref(), Some("Voilà le résumé"));
    assert_eq!(msg.attachment_count(), 1);
    let part = msg.attachment(0).unwrap();
    assert_eq!(part.attachment_name(), Some("résumé été.pdf"));
    assert_eq!(part.contents(), b"%PDF-1.4 fake");
}

// ─── Test 5: Attachments and embedded files keep count and order ────

#[test]
fn test_parts_keep_count_and_order() {
    let embedded = vec![
        EmbeddedFile::new(b"GIF89a-1".to_vec(), "logo").with_mime_type("image", "gif"),
        EmbeddedFile::new(b"\x89PNG-2".to_vec(), "chart").with_mime_type("image", "png"),
    ];
    let attachments = vec![
        Attachment::new(b"first".to_vec()).with_filename("one.bin"),
        Attachment::new(b"second".to_vec())
            .with_mime_type("text", "plain")
            .with_charset("us-ascii")
            .with_filename("two.txt"),
        Attachment::new(b"third".to_vec()).with_filename("three.bin"),
    ];
    let content = MailContent {
        text: text("plain", "us-ascii"),
        html: text("<img src=\"cid:logo\"><img src=\"cid:chart\">", "us-ascii"),
        attachments: attachments.into_iter().map(Into::into).collect(),
        embeddeds: embedded.into_iter().map(Into::into).collect(),
        ..Default::default()
    };
    let mail = compose_mail(
        &"me@foo.com".into(),
        &["him@bar.com".into()],
        "parts",
        "utf-8",
        &content,
        &FinalizeOptions::default(),
    )
    .unwrap();

    let raw = String::from_utf8_lossy(&mail.payload);
    assert!(raw.contains("Content-ID: <logo>"));
    assert!(raw.contains("Content-ID: <chart>"));
    let positions: Vec<usize> = ["one.bin", "two.txt", "three.bin"]
        .iter()
        .map(|name| raw.find(name).expect("attachment present"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(raw.find("Content-ID: <logo>") < raw.find("Content-ID: <chart>"));

    let msg = parse(&mail.payload);
    assert_eq!(body_text(&msg).as_deref(), Some("plain"));
    assert!(msg.body_html(0).is_some());
    let names: Vec<Option<&str>> = msg.attachments().map(|p| p.attachment_name()).collect();
    assert!(names.ends_with(&[Some("one.bin"), Some("two.txt"), Some("three.bin")]));
}

// ─── Test 6: Message-Id domain override ─────────────────────────────

#[test]
fn test_message_id_domain() {
    let body = build_mail(Some(("x", "us-ascii")), None, &[], &[], false).unwrap();
    let options = FinalizeOptions {
        message_id_seed: Some("foo@my.host.example".into()),
        ..Default::default()
    };
    let mail = complete_mail(&body, &"me@foo.com".into(), &[], "s", "utf-8", &options).unwrap();
    let msg = parse(&mail.payload);
    let id = msg.message_id().expect("Message-Id present");
    assert_eq!(id.rsplit('@').next(), Some("my.host.example"));
}

// ─── Test 7: Finalizing twice is stable ─────────────────────────────

#[test]
fn test_finalize_is_deterministic_except_message_id() {
    let attachment = Attachment::new(b"data".to_vec()).with_filename("d.bin");
    let body = build_mail(
        Some(("text", "us-ascii")),
        Some(("<p>html</p>", "us-ascii")),
        &[attachment.into()],
        &[],
        false,
    )
    .unwrap();
    let options = FinalizeOptions {
        message_id_seed: Some("stable".into()),
        date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        ..Default::default()
    };
    let render = || {
        let mail = complete_mail(
            &body,
            &("Me", "me@foo.com").into(),
            &["him@bar.com".into()],
            "subject",
            "utf-8",
            &options,
        )
        .unwrap();
        String::from_utf8(mail.payload)
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with("Message-Id:"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(render(), render());
}

// ─── Test 8: Bcc stays out of the headers ───────────────────────────

#[test]
fn test_bcc_only_in_envelope() {
    let options = FinalizeOptions {
        cc: vec!["cc@example.com".into()],
        bcc: vec!["hidden@example.com".into()],
        ..Default::default()
    };
    let content = MailContent::default();
    let mail = compose_mail(
        &"me@foo.com".into(),
        &["to@example.com".into()],
        "s",
        "utf-8",
        &content,
        &options,
    )
    .unwrap();
    assert_eq!(
        mail.envelope.rcpt_to,
        vec!["to@example.com", "cc@example.com", "hidden@example.com"]
    );
    let msg = parse(&mail.payload);
    assert!(msg.bcc().is_none());
    assert!(!String::from_utf8_lossy(&mail.payload).contains("hidden@example.com"));
}

// ─── Test 9: Strict charset policy ──────────────────────────────────

#[test]
fn test_strict_policy_rejects_unencodable_name() {
    let options = FinalizeOptions {
        charset_policy: CharsetPolicy::Strict,
        ..Default::default()
    };
    let res = compose_mail(
        &"me@foo.com".into(),
        &[("M\u{101}ori", "maori@example.com").into()],
        "s",
        "iso-8859-1",
        &MailContent::default(),
        &options,
    );
    assert!(matches!(res, Err(MailError::Unencodable { .. })));
}

// ─── Test 10: File-backed attachments ───────────────────────────────

#[test]
fn test_attachments_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("report.pdf");
    let gif = dir.path().join("logo.gif");
    std::fs::write(&pdf, b"%PDF").unwrap();
    std::fs::write(&gif, b"GIF89a").unwrap();

    let content = MailContent {
        html: text("<img src=\"cid:logo.gif\">", "us-ascii"),
        attachments: vec![Attachment::from_path(&pdf, Some("application/pdf")).unwrap().into()],
        embeddeds: vec![EmbeddedFile::from_path(&gif, None, None, None).unwrap().into()],
        ..Default::default()
    };
    let mail = compose_mail(
        &"me@foo.com".into(),
        &["him@bar.com".into()],
        "files",
        "utf-8",
        &content,
        &FinalizeOptions::default(),
    )
    .unwrap();

    let raw = String::from_utf8_lossy(&mail.payload);
    assert!(raw.contains("Content-Type: image/gif"));
    assert!(raw.contains("Content-ID: <logo.gif>"));
    assert!(raw.contains("Content-Type: application/pdf"));

    let msg = parse(&mail.payload);
    let pdf_part = msg
        .attachments()
        .find(|p| p.attachment_name() == Some("report.pdf"))
        .expect("pdf attachment");
    assert_eq!(pdf_part.contents(), b"%PDF");
}

// ─── Test 11: Long address lists stay within line limits ────────────

#[test]
fn test_many_recipients_fold_and_decode() {
    let to: Vec<Address> = (0..60)
        .map(|i| Address::from((format!("Recipient {i}"), format!("user{i}@example.com"))))
        .collect();
    let content = MailContent {
        text: text("body", "us-ascii"),
        ..Default::default()
    };
    let mail = compose_mail(
        &"me@foo.com".into(),
        &to,
        "many",
        "utf-8",
        &content,
        &FinalizeOptions::default(),
    )
    .unwrap();

    let raw = String::from_utf8(mail.payload.clone()).unwrap();
    assert!(raw.split("\r\n").all(|line| line.len() <= 998));

    let msg = parse(&mail.payload);
    let decoded = msg.to().and_then(|a| a.as_list()).expect("To header");
    assert_eq!(decoded.len(), 60);
    for (i, addr) in decoded.iter().enumerate() {
        assert_eq!(addr.name(), Some(format!("Recipient {i}").as_str()));
        assert_eq!(addr.address(), Some(format!("user{i}@example.com").as_str()));
    }
}
