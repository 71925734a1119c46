//! NMDC end-to-end scenarios and the message corpus.

use dcwire::nmdc::{self, Message};

fn unmarshal(line: &[u8]) -> Message {
    nmdc::unmarshal(None, line).unwrap()
}

fn marshal(msg: &Message) -> Vec<u8> {
    nmdc::marshal(None, msg).unwrap()
}

#[test]
fn test_chat_encode() {
    let msg = Message::Chat(nmdc::ChatMessage {
        name: "bob".into(),
        text: "text".into(),
    });
    assert_eq!(marshal(&msg), b"<bob> text|");
}

#[test]
fn test_chat_decode_stream() {
    let mut r = nmdc::Reader::new(&b"<bob>text msg|<fred> msg2|"[..]);
    let mut msgs = Vec::new();
    while let Some(m) = r.read_msg().unwrap() {
        msgs.push(m);
    }
    assert_eq!(
        msgs,
        vec![
            Message::Chat(nmdc::ChatMessage {
                name: "bob".into(),
                text: "text msg".into(),
            }),
            Message::Chat(nmdc::ChatMessage {
                name: "fred".into(),
                text: "msg2".into(),
            }),
        ]
    );
}

#[test]
fn test_lock_key_transformation() {
    let lock = nmdc::Lock {
        lock: "_verlihub".into(),
        pk: "version0.9.8e-r2".into(),
        ..nmdc::Lock::default()
    };
    let exp: Vec<u8> = vec![
        0x75, 0xd1, 0xc0, 0x11, 0xb0, 0xa0, 0x10, 0x10, 0x41, 0x20, 0xd1, 0xb1, 0xb1, 0xc0,
        0xc0, 0x30, 0x31, 0x92, 0x31, 0x71, 0xe1, 0x50, 0x10, 0xd1, 0x71,
    ];
    assert_eq!(lock.key().key, exp);
}

#[test]
fn test_zon_compressed_session() {
    let mut w = nmdc::Writer::new(Vec::new());
    w.zon().unwrap();
    w.write_msg(&Message::from(nmdc::Hello {
        name: "john".into(),
    }))
    .unwrap();
    w.line_writer().disable_deflate().unwrap();
    w.write_msg(&Message::from(nmdc::GetNickList)).unwrap();
    w.flush().unwrap();
    let stream = w.into_inner();

    let mut r = nmdc::Reader::new(&stream[..]);
    assert!(matches!(r.read_msg().unwrap().unwrap(), Message::ZOn(_)));
    r.enable_inflate().unwrap();
    match r.read_msg().unwrap().unwrap() {
        Message::Hello(h) => assert_eq!(h.name, "john"),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(matches!(
        r.read_msg().unwrap().unwrap(),
        Message::GetNickList(_)
    ));
    assert!(r.read_msg().unwrap().is_none());
}

/// Canonical corpus: `data` must decode into the message and the
/// message must re-encode to `exp` (or `data` when `exp` is `None`).
struct Case {
    line: &'static [u8],
    exp: Option<&'static [u8]>,
}

fn check(c: &Case) {
    let msg = unmarshal(c.line);
    let exp = c.exp.unwrap_or(c.line);
    assert_eq!(
        marshal(&msg),
        exp,
        "for input {:?}",
        String::from_utf8_lossy(c.line)
    );
}

#[test]
fn test_corpus_roundtrip() {
    let cases = [
        Case {
            line: b"$FailOver example.com,example.org:5555,adc://example.net:6666|",
            exp: None,
        },
        Case {
            line: b"$UserIP john doe 192.168.1.2$$|",
            exp: None,
        },
        Case {
            line: b"$Lock EXTENDEDPROTOCOLABCABCABCABCABCABC Pk=DCPLUSPLUS0.777Ref=dchub://example.org:411|",
            exp: None,
        },
        Case {
            line: b"$Supports NoHello NoGetINFO TTHSearch|",
            exp: None,
        },
        Case {
            line: b"$MyINFO $ALL johndoe RU<ApexDC++ V:0.4.0,M:P,H:27/1/3,S:92,L:512>$ $LAN(T3)K$example@example.com$1234$|",
            exp: None,
        },
        Case {
            line: b"$MyINFO $ALL N8611 <++ V:0.868,M:A,H:34,S:3>$A$0.005.$$27225945203$|",
            exp: Some(b"$MyINFO $ALL N8611 <++ V:0.868,M:A,H:34/0/0,S:3>$ $0.005.$$27225945203$|"),
        },
        Case {
            line: b"$ConnectToMe john 192.168.1.2:412NS peter|",
            exp: None,
        },
        Case {
            line: b"$RevConnectToMe alice bob|",
            exp: None,
        },
        Case {
            line: b"$To: john From: room $<peter> dogs are more cute|",
            exp: None,
        },
        Case {
            line: b"$Search 192.168.1.5:412 T?T?500000?1?Gentoo$2005|",
            exp: None,
        },
        Case {
            line: b"$Search Hub:SomeNick F?T?0?9?TTH:TO32WPD6AQE7VA7654HEAM5GKFQGIL7F2BEKFNA|",
            exp: None,
        },
        Case {
            line: b"$SR User1 dir\\file 1.txt\x05437 3/4\x05Testhub (192.168.1.1:411)\x05User2|",
            exp: None,
        },
        Case {
            line: b"$SA LWPNACQDBZRYXW3VHJVCJ64QBZNGHOHHHZWCLNQ 1.2.3.4:412|",
            exp: None,
        },
        Case {
            line: b"$ADCGET file TTH/BR4BVJBMHDFVCFI4WBPSL63W5TWXWVBSC574BLI 124 12352 ZL1|",
            exp: None,
        },
        Case {
            line: b"$MCTo target $sender some message|",
            exp: None,
        },
        Case {
            line: b"$UserCommand 1 3 a\\b\\c$<%[mynick]> +cchist|",
            exp: Some(b"$UserCommand 1 3 a\\b\\c $<%[mynick]> +cchist|"),
        },
        Case {
            line: b"$HubINFO OZERKI$dc.ozerki.pro$Main Hub$5000$0$1$2721$PtokaX$|",
            exp: Some(b"$HubINFO OZERKI$dc.ozerki.pro$Main Hub$5000$0$1$2721$PtokaX$$$|"),
        },
        Case {
            line: b"$GetNickList|",
            exp: None,
        },
        Case {
            line: b"$OpList op 1$$op 2$$|",
            exp: None,
        },
        Case {
            line: b"$Kick john|",
            exp: None,
        },
        Case {
            line: b"$ForceMove dc.example.org:411|",
            exp: None,
        },
        Case {
            line: b"$Error message|",
            exp: None,
        },
    ];
    for c in &cases {
        check(c);
    }
}

#[test]
fn test_encoded_lines_end_with_delimiter_and_no_nul() {
    let msgs: Vec<Message> = vec![
        Message::from(nmdc::Hello {
            name: "john".into(),
        }),
        Message::from(nmdc::GetNickList),
        Message::Chat(nmdc::ChatMessage {
            name: "bob".into(),
            text: "escaped $ | &".into(),
        }),
    ];
    for msg in &msgs {
        let line = marshal(msg);
        assert_eq!(*line.last().unwrap(), b'|');
        assert!(!line[..line.len() - 1].contains(&b'|'));
        assert!(!line.contains(&0));
    }
}

#[test]
fn test_unknown_command_survives_reencode() {
    let msg = unmarshal(b"$FutureCommand with args|");
    match &msg {
        Message::Raw(raw) => {
            assert_eq!(raw.typ, "FutureCommand");
            assert_eq!(&raw.data[..], b"with args");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(marshal(&msg), b"$FutureCommand with args|");
}

#[test]
fn test_chat_name_with_brackets_roundtrip() {
    let msg = Message::Chat(nmdc::ChatMessage {
        name: "a<b>c".into(),
        text: "hi".into(),
    });
    let line = marshal(&msg);
    assert_eq!(line, b"<a&lt;b&gt;c> hi|");
    assert_eq!(unmarshal(&line), msg);
}
