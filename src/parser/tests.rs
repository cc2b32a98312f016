/*
** This file is a part of xmpp-session (XMPP client session engine)
** Copyright (C) 2000-2025 Gurer Ozen
**
** xmpp-session is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::*;

struct Tester<'a> {
    expected: &'a [SaxElement<'a>],
    current: usize,
    cdata_buf: String,
}

impl<'a> Tester<'a> {
    fn new(expected: &'a [SaxElement]) -> Tester<'a> {
        Tester {
            expected,
            current: 0,
            cdata_buf: String::new(),
        }
    }

    fn check(&mut self, s: &str) {
        let nr_lines = s.matches("\n").count();
        let nr_column = s.len() - s.rfind('\n').map(|i| i + 1).unwrap_or(0);

        let mut parser = SaxParser::new();
        assert_eq!(parser.parse_bytes(self, s.as_bytes()), Ok(s.len()));
        assert!(!parser.is_inside_markup());
        assert_eq!(parser.depth(), 0);
        assert_eq!(self.current, self.expected.len());
        assert_eq!(parser.location().lines, nr_lines);
        assert_eq!(parser.location().column, nr_column);
        assert_eq!(parser.location().bytes, s.len());

        // now try byte by byte, keeping what the parser leaves behind
        parser.reset();
        self.current = 0;
        self.cdata_buf.clear();
        let mut pending = Vec::new();
        for b in s.as_bytes() {
            pending.push(*b);
            let consumed = parser.parse_bytes(self, &pending).unwrap();
            pending.drain(..consumed);
        }
        assert!(pending.is_empty());
        assert_eq!(self.current, self.expected.len());
        assert_eq!(parser.location().lines, nr_lines);
        assert_eq!(parser.location().column, nr_column);
        assert_eq!(parser.location().bytes, s.len());
    }
}

impl<'a> SaxHandler for Tester<'a> {
    fn handle_element(&mut self, element: &SaxElement, _offset: usize) -> Result<(), SaxError> {
        assert!(self.current < self.expected.len());
        if let SaxElement::CData(cdata) = element {
            if let SaxElement::CData(cdata2) = self.expected[self.current] {
                self.cdata_buf.push_str(cdata);
                if self.cdata_buf.len() >= cdata2.len() {
                    assert_eq!(self.cdata_buf, cdata2);
                    self.current += 1;
                    self.cdata_buf.clear();
                }
            } else {
                assert_eq!(element, &self.expected[self.current]);
            }
        } else {
            assert_eq!(element, &self.expected[self.current]);
            self.current += 1;
        }
        Ok(())
    }
}

struct BadTester {
    bad_byte: usize,
}

impl BadTester {
    fn new(bad_byte: usize) -> BadTester {
        BadTester { bad_byte }
    }

    fn check(&mut self, s: &str) {
        self.check_bytes(s.as_bytes())
    }

    fn check_bytes(&mut self, bytes: &[u8]) {
        let mut parser = SaxParser::new();
        assert!(matches!(
            parser.parse_bytes(self, bytes),
            Err(SaxError::BadXml(_))
        ));
        assert_eq!(parser.location().bytes, self.bad_byte);
    }
}

impl SaxHandler for BadTester {
    fn handle_element(&mut self, _element: &SaxElement, _offset: usize) -> Result<(), SaxError> {
        Ok(())
    }
}

#[derive(Default)]
struct Recorder {
    events: Vec<(String, usize)>,
    pause_on_close: bool,
    paused: bool,
}

impl SaxHandler for Recorder {
    fn handle_element(&mut self, element: &SaxElement, offset: usize) -> Result<(), SaxError> {
        let text = match element {
            SaxElement::StartTag(name) => format!("<{}", name),
            SaxElement::Attribute(name, value) => format!("{}={}", name, value),
            SaxElement::StartTagContent => ">".to_string(),
            SaxElement::StartTagEmpty => "/>".to_string(),
            SaxElement::EndTag(name) => format!("</{}", name),
            SaxElement::CData(s) => s.to_string(),
        };
        if matches!(element, SaxElement::StartTagEmpty | SaxElement::EndTag(_)) {
            self.paused = self.pause_on_close;
        }
        self.events.push((text, offset));
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

#[test]
fn tags() {
    Tester::new(&[SaxElement::StartTag("lonely"), SaxElement::StartTagEmpty]).check("<lonely/>");

    Tester::new(&[SaxElement::StartTag("lonely"), SaxElement::StartTagEmpty])
        .check("   <lonely/>    ");

    Tester::new(&[
        SaxElement::StartTag("parent"),
        SaxElement::StartTagContent,
        SaxElement::StartTag("child"),
        SaxElement::StartTagEmpty,
        SaxElement::StartTag("child"),
        SaxElement::StartTagEmpty,
        SaxElement::CData("child"),
        SaxElement::EndTag("parent"),
    ])
    .check("<?xml version='1.0'?><parent><child/><child/>child</parent>");

    Tester::new(&[
        SaxElement::StartTag("parent"),
        SaxElement::StartTagContent,
        SaxElement::StartTag("empty"),
        SaxElement::StartTagEmpty,
        SaxElement::StartTag("b"),
        SaxElement::StartTagContent,
        SaxElement::CData("lala"),
        SaxElement::EndTag("b"),
        SaxElement::EndTag("parent"),
    ])
    .check("<parent  ><empty \t /><b>lala</b \n></parent>");

    Tester::new(&[
        SaxElement::StartTag("mytag"),
        SaxElement::Attribute("abc", "123"),
        SaxElement::Attribute("id", "XC72"),
        SaxElement::StartTagContent,
        SaxElement::EndTag("mytag"),
    ])
    .check("<mytag abc='123' id=\"XC72\"></mytag>");

    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::StartTagContent,
        SaxElement::StartTag("b"),
        SaxElement::Attribute("x1", "lala"),
        SaxElement::StartTagEmpty,
        SaxElement::StartTag("c"),
        SaxElement::Attribute("x2", "bibi"),
        SaxElement::StartTagEmpty,
        SaxElement::EndTag("a"),
    ])
    .check("<a><b x1 ='lala'/><c x2\t= \t'bibi'/></a>");

    Tester::new(&[
        SaxElement::StartTag("tag"),
        SaxElement::Attribute("a", "12\"34"),
        SaxElement::Attribute("b", "123'456"),
        SaxElement::StartTagEmpty,
    ])
    .check("<tag a='12\"34' b=\"123'456\" />");

    Tester::new(&[
        SaxElement::StartTag("stream:stream"),
        SaxElement::Attribute("xmlns:stream", "http://etherx.jabber.org/streams"),
        SaxElement::Attribute("xml:lang", "en"),
        SaxElement::StartTagContent,
        SaxElement::StartTag("message"),
        SaxElement::StartTagContent,
        SaxElement::StartTag("body"),
        SaxElement::StartTagContent,
        SaxElement::CData("john&mary"),
        SaxElement::EndTag("body"),
        SaxElement::EndTag("message"),
        SaxElement::EndTag("stream:stream"),
    ])
    .check(
        "<stream:stream xmlns:stream='http://etherx.jabber.org/streams' xml:lang='en'>\
         <message><body>john&amp;mary</body></message></stream:stream>",
    );
}

#[test]
fn multiple_roots() {
    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::StartTagEmpty,
        SaxElement::StartTag("b"),
        SaxElement::StartTagContent,
        SaxElement::CData("x"),
        SaxElement::EndTag("b"),
    ])
    .check("<a/>\n<b>x</b>\n");
}

#[test]
fn comments() {
    Tester::new(&[
        SaxElement::StartTag("item"),
        SaxElement::Attribute("url", "http://jabber.org"),
        SaxElement::StartTagContent,
        SaxElement::CData("Jabber Site"),
        SaxElement::EndTag("item"),
    ])
    .check("<item url='http://jabber.org'><!-- little comment -->Jabber Site</item>");

    Tester::new(&[SaxElement::StartTag("empty"), SaxElement::StartTagEmpty])
        .check("<!-- comment --> <empty/> <!-- lala -->");
}

#[test]
fn cdatas() {
    Tester::new(&[
        SaxElement::StartTag("ka"),
        SaxElement::StartTagContent,
        SaxElement::CData("1234 <ka> lala ] ]] ]]] 4321"),
        SaxElement::EndTag("ka"),
    ])
    .check("<ka>1234<![CDATA[ <ka> lala ] ]] ]]] ]]>4321</ka>");

    Tester::new(&[
        SaxElement::StartTag("data"),
        SaxElement::StartTagContent,
        SaxElement::CData("[TEST]]"),
        SaxElement::EndTag("data"),
    ])
    .check("<data><![CDATA[[TEST]]]]></data>");

    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::StartTagContent,
        SaxElement::CData("[[bg:Чингис хан]][[bn:চেঙ্গিজ খান]]"),
        SaxElement::EndTag("a"),
    ])
    .check("<a>[[bg:Чингис хан]][[bn:চেঙ্গিজ খান]]</a>");
}

#[test]
fn pi() {
    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::StartTagContent,
        SaxElement::CData("bibi"),
        SaxElement::EndTag("a"),
    ])
    .check("<a><?xml lala? ok?>bibi</a>");
}

#[test]
fn entities() {
    Tester::new(&[
            SaxElement::StartTag("body"),
            SaxElement::StartTagContent,
            SaxElement::CData("I'm fixing parser&tester for \"<\" and \">\" chars."),
            SaxElement::EndTag("body"),
        ])
        .check("<body>I&apos;m fixing parser&amp;tester for &quot;&lt;&quot; and &quot;&gt;&quot; chars.</body>");

    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::StartTagContent,
        SaxElement::CData(";AB;"),
        SaxElement::EndTag("a"),
    ])
    .check("<a>&#x3B;&#65;&#x42;&#x3b;</a>");

    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::StartTagContent,
        SaxElement::CData(" \u{90} \u{900} \u{10abc} "),
        SaxElement::EndTag("a"),
    ])
    .check("<a> &#x90; &#x900; &#x10abc; </a>");
}

#[test]
fn attribute_entities() {
    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::Attribute("b", "a&b BA"),
        SaxElement::StartTagContent,
        SaxElement::EndTag("a"),
    ])
    .check("<a b='a&amp;b &#x42;&#65;'></a>");
}

#[test]
fn long_tag() {
    let name = "abc".repeat(500);
    let xml = format!("<{}></{}>", name, name);

    Tester::new(&[
        SaxElement::StartTag(&name),
        SaxElement::StartTagContent,
        SaxElement::EndTag(&name),
    ])
    .check(&xml);
}

#[test]
fn offsets() {
    let mut recorder = Recorder::default();
    let mut parser = SaxParser::new();
    let xml = "<a><b x='1'>hi</b><c/></a>";
    assert_eq!(parser.parse_bytes(&mut recorder, xml.as_bytes()), Ok(xml.len()));
    let expected: Vec<(String, usize)> = [
        ("<a", 0),
        (">", 3),
        ("<b", 3),
        ("x=1", 3),
        (">", 12),
        ("hi", 12),
        ("</b", 14),
        ("<c", 18),
        ("/>", 22),
        ("</a", 22),
    ]
    .iter()
    .map(|(s, o)| (s.to_string(), *o))
    .collect();
    assert_eq!(recorder.events, expected);
}

#[test]
fn pause() {
    let mut recorder = Recorder {
        pause_on_close: true,
        ..Default::default()
    };
    let mut parser = SaxParser::new();
    let xml = b"<a/><b>t</b>";
    assert_eq!(parser.parse_bytes(&mut recorder, xml), Ok(4));
    assert!(!parser.is_inside_markup());

    // A paused parser can be reset without losing anything of the next element
    parser.reset();
    recorder.paused = false;
    recorder.events.clear();
    assert_eq!(parser.parse_bytes(&mut recorder, &xml[4..]), Ok(8));
    assert_eq!(recorder.events[0], ("<b".to_string(), 0));
    assert_eq!(recorder.events[3], ("</b".to_string(), 4));
}

#[test]
fn split_utf8() {
    let mut recorder = Recorder::default();
    let mut parser = SaxParser::new();
    assert_eq!(parser.parse_bytes(&mut recorder, b"<a>x\xd0"), Ok(4));
    assert_eq!(parser.parse_bytes(&mut recorder, b"\xd0"), Ok(0));
    assert_eq!(parser.parse_bytes(&mut recorder, b"\xd0\xa7</a>"), Ok(6));
    let text: String = recorder
        .events
        .iter()
        .filter(|(s, _)| !s.starts_with('<') && s != ">")
        .map(|(s, _)| s.as_str())
        .collect();
    assert_eq!(text, "xЧ");
}

#[test]
fn bad_tags() {
    BadTester::new(4).check("<a>< b/></a>");
    BadTester::new(6).check("<a><b/ ></a>");
    BadTester::new(8).check("<a></ccc/></a>");
    BadTester::new(13).check("<a><b/><c></c/></a>");
    BadTester::new(1).check("</a>");
    BadTester::new(9).check("<a> </a  b>");
    BadTester::new(10).check("<a a='1' b></a>");
    BadTester::new(11).check("<a a='1' b=></a>");
    BadTester::new(12).check("<a a='12' b '2'></a>");
    BadTester::new(13).check("<a a='123' b c='5'></a>");
    BadTester::new(14).check("<a a='12'></a b='1'>");
    BadTester::new(17).check("<g><test a='123'/ b='lala'></g>");
    BadTester::new(13).check("<a a='1' b='></a>");
    BadTester::new(13).check("<a a='1' b=\"></a>");
    BadTester::new(5).check("<a> <> </a>");
    BadTester::new(6).check("<a> </> </a>");
}

#[test]
fn bad_comments() {
    BadTester::new(10).check("<e><!-- -- --></e>");
    BadTester::new(22).check("<ha><!-- <lala> --><!- comment -></ha>");
    BadTester::new(12).check("<!-- c1 --> lala <ha/>");
    BadTester::new(31).check("<!-- c1 --> <ha/> <!-- pika -->c");
    BadTester::new(9).check("<!-- c ---> <ha/>");
}

#[test]
fn bad_cdatas() {
    BadTester::new(2).check("  lala <a></a>");
    BadTester::new(10).check("  <a></a> lala");
    BadTester::new(11).check("  <a></a > lala");
    BadTester::new(13).check("<e/> <?xml ?>lala");
    BadTester::new(2).check("<![CDATA[lala]> <a/>");
    BadTester::new(8).check(" <a/> <![CDATA[lala]>");
    BadTester::new(7).check("<a> <![DATA[lala]> </a>");
    BadTester::new(9).check("<a> <![CDaTA[lala]> </a>");
    BadTester::new(12).check("<a> <![CDATAlala]> </a>");
}

#[test]
fn bad_entities() {
    BadTester::new(8).check("<a>&lala;</a>");
    BadTester::new(12).check("<a>&lala           </a>");
    BadTester::new(16).check("<lol>&lt;<&gt;</lol>");
    BadTester::new(6).check("<a>&#1a;</a>");
    BadTester::new(5).check("<a>&#Xaa;</a>");
    BadTester::new(8).check("<a>&#xa5g;</a>");
    BadTester::new(6).check("<a>&#8;</a>");
    BadTester::new(7).check("<a>&#11;</a>");
    BadTester::new(7).check("<a>&#15;</a>");
    BadTester::new(10).check("<a>&#xD800;</a>");
    BadTester::new(10).check("<a>&#xDfFf;</a>");
    BadTester::new(10).check("<a>&#xfFfE;</a>");
    BadTester::new(10).check("<a>&#xFFff;</a>");
    BadTester::new(11).check("<a>&#x110000;</a>");
    BadTester::new(11).check("<a>&#99999999999;</a>");
}

#[test]
fn bad_chars() {
    BadTester::new(6).check_bytes(b"<test>\xFF</test>");
    BadTester::new(6).check_bytes(b"<test>\xFE</test>");
    BadTester::new(2).check_bytes(b"<t\x00></t>");
    BadTester::new(2).check_bytes(b"<t\x19></t>");
    BadTester::new(8).check_bytes(b"<test>\xe3\x8fa</test>");
    BadTester::new(7).check_bytes(b"<test>\xC0\x80</test>");
    BadTester::new(7).check_bytes(b"<test>\xC0\xaf</test>");
    BadTester::new(8).check_bytes(b"<test>\xe0\x80\xaf</test>");
    BadTester::new(9).check_bytes(b"<test>\xf0\x80\x80\xaf</test>");
    BadTester::new(7).check_bytes(b"<test>\xc1\xbf</test>");
    BadTester::new(8).check_bytes(b"<test>\xe0\x9f\xbf</test>");
    BadTester::new(9).check_bytes(b"<test>\xf0\x8f\xbf\xbf</test>");
    BadTester::new(1).check_bytes(b"<\x8f\x85></\x8f\x85>");
    BadTester::new(7).check_bytes(
        b"<utf8>\xC1\x80<br/>\xED\x95\x9C\xEA\xB5\xAD\xEC\x96\xB4<err>\xC1\x65</err></utf8>",
    );
}

#[test]
fn unfinished() {
    let mut handler = BadTester::new(0);
    let mut parser = SaxParser::new();

    assert_eq!(parser.parse_bytes(&mut handler, b" <a> "), Ok(5));
    assert!(!parser.is_inside_markup());
    assert_eq!(parser.depth(), 1);

    for s in [
        " <a></a> <!-- open comment ",
        " <a></a> <?app open pi ",
        "<a x='1",
        "<a></a",
    ] {
        parser.reset();
        assert_eq!(parser.parse_bytes(&mut handler, s.as_bytes()), Ok(s.len()));
        assert!(parser.is_inside_markup());
    }
}
