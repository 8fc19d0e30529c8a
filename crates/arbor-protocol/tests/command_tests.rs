use arbor_protocol::*;

fn addr(s: &str) -> Address {
    s.parse().unwrap()
}

#[test]
fn test_parse_console() {
    let cmd: Command = "abc CONSOLE ls -la /tmp".parse().unwrap();
    assert_eq!(
        cmd,
        Command::Console(ConsoleCommand::new("abc", vec!["ls".into(), "-la".into(), "/tmp".into()]))
    );
    assert_eq!(cmd.hash(), "abc");
    assert_eq!(cmd.kind(), CommandKind::Console);
}

#[test]
fn test_parse_init_and_add_child() {
    let init: Command = "h1 INIT 10.0.0.2 9000".parse().unwrap();
    assert_eq!(init, Command::Init(InitCommand::new("h1", addr("10.0.0.2:9000"))));

    let add: Command = "h2 ADD_CHILD ::1 7000".parse().unwrap();
    assert_eq!(add, Command::AddChild(AddChildCommand::new("h2", addr("[::1]:7000"))));
}

#[test]
fn test_parse_report_keeps_text() {
    let cmd: Command = "h3 REPORT disk  usage: 93%".parse().unwrap();
    assert_eq!(cmd, Command::Report(ReportCommand::new("h3", "disk  usage: 93%")));
}

#[test]
fn test_keyword_case_insensitive() {
    let cmd: Command = "h4 add_child 127.0.0.1 1".parse().unwrap();
    assert_eq!(cmd.kind(), CommandKind::AddChild);
    let cmd: Command = "h5 Console uptime".parse().unwrap();
    assert_eq!(cmd.kind(), CommandKind::Console);
}

#[test]
fn test_keyword_prefix_is_not_a_match() {
    assert!(matches!(
        "h6 I 127.0.0.1 1".parse::<Command>(),
        Err(ProtocolError::UnknownKeyword(_))
    ));
    assert!(matches!(
        "h6 CONS echo".parse::<Command>(),
        Err(ProtocolError::UnknownKeyword(_))
    ));
    assert!(matches!(
        "h6 INITX 127.0.0.1 1".parse::<Command>(),
        Err(ProtocolError::UnknownKeyword(_))
    ));
}

#[test]
fn test_malformed_commands_rejected() {
    assert!(matches!("".parse::<Command>(), Err(ProtocolError::Empty)));
    assert!("   ".parse::<Command>().is_err());
    assert!("onlyhash".parse::<Command>().is_err());
    assert!("h CONSOLE".parse::<Command>().is_err());
    assert!("h INIT 10.0.0.1".parse::<Command>().is_err());
    assert!("h INIT not-an-ip 80".parse::<Command>().is_err());
    assert!("h INIT 10.0.0.1 70000".parse::<Command>().is_err());
    assert!("h ADD_CHILD 10.0.0.1 80 extra".parse::<Command>().is_err());
}

#[test]
fn test_surrounding_whitespace_trimmed() {
    let cmd: Command = "  h7 CONSOLE uptime \r\n".parse().unwrap();
    assert_eq!(cmd.to_string(), "h7 CONSOLE uptime");
}

#[test]
fn test_custom_delimiter() {
    let cmd = Command::parse("h8;INIT;10.1.1.1;5000", ";").unwrap();
    assert_eq!(cmd, Command::Init(InitCommand::new("h8", addr("10.1.1.1:5000"))));
    assert_eq!(cmd.encode(";"), "h8;INIT;10.1.1.1;5000");
}

#[test]
fn test_wire_form_roundtrip_every_variant() {
    let commands: Vec<Command> = vec![
        ConsoleCommand::new("c1", vec!["echo".into(), "hello".into()]).into(),
        InitCommand::new("i1", addr("192.168.0.10:4242")).into(),
        AddChildCommand::new("a1", addr("[fe80::1]:80")).into(),
        ReportCommand::new("r1", "job finished: 3 ok").into(),
    ];
    for cmd in commands {
        let reparsed: Command = cmd.to_string().parse().unwrap();
        assert_eq!(reparsed, cmd);
    }
}

#[test]
fn test_digest_covers_hash_field() {
    let a: Command = "h1 CONSOLE uptime".parse().unwrap();
    let b: Command = "h2 CONSOLE uptime".parse().unwrap();
    let a_again: Command = "h1   console   uptime".parse().unwrap();
    assert_ne!(a.digest(), b.digest());
    assert_eq!(a.digest(), a_again.digest(), "digest is independent of formatting");
}

#[test]
fn test_report_text_is_trimmed_and_roundtrips() {
    let report = ReportCommand::new("r", "  x  ");
    assert_eq!(report.text, "x");

    let cmd = Command::from(report);
    assert_eq!(cmd.to_string(), "r REPORT x");
    assert_eq!(Command::parse(&cmd.to_string(), " ").unwrap(), cmd);

    // Inner whitespace survives.
    let inner = Command::from(ReportCommand::new("r", " a  b "));
    assert_eq!(Command::parse(&inner.to_string(), " ").unwrap(), inner);
}
