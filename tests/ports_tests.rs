use portpulse::ports::{parse_port_spec, PortSpecError};

#[test]
fn ranges_singles_and_dedup() {
    assert_eq!(
        parse_port_spec("20-25").expect("parse ok"),
        vec![20, 21, 22, 23, 24, 25]
    );
    assert_eq!(parse_port_spec("80,80,443").expect("parse ok"), vec![80, 443]);
    assert_eq!(
        parse_port_spec(" 22 , 80-82 , 81 ").expect("parse ok"),
        vec![22, 80, 81, 82]
    );
}

#[test]
fn error_kinds_are_specific() {
    assert!(matches!(
        parse_port_spec("100-50"),
        Err(PortSpecError::InvalidRange(_))
    ));
    assert!(matches!(
        parse_port_spec("0-10"),
        Err(PortSpecError::PortOutOfBounds(0))
    ));
    assert!(matches!(parse_port_spec(""), Err(PortSpecError::EmptyPortSet)));
    assert!(matches!(
        parse_port_spec("https"),
        Err(PortSpecError::InvalidPort(_))
    ));
}
