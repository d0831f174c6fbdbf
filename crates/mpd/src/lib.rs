// MPEG-DASH Media Presentation Description (MPD) handling
pub mod error;
pub mod model;

pub use error::ParseError;
pub use model::{
    AdaptationSet, BaseUrl, Mpd, Period, Representation, SegmentTemplate, SegmentTimeline,
    TimelineEntry,
};

/// Parse a raw MPD document.
///
/// The document is read with [`dash_mpd::parse`] and narrowed to the subset of
/// the schema described in [`model`]; unknown elements and attributes are
/// ignored.
pub fn parse(bytes: &[u8]) -> Result<Mpd, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(dash_mpd::parse(text)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    const LIVE_MPD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="dynamic"
     availabilityStartTime="2024-05-01T10:00:00Z"
     publishTime="2024-05-01T12:30:00Z"
     minimumUpdatePeriod="PT2S">
  <BaseURL>https://cdn.example.com/live/</BaseURL>
  <Period id="7" start="PT1H30M">
    <BaseURL>dash/</BaseURL>
    <AdaptationSet id="v" mimeType="video/mp4">
      <SegmentTemplate timescale="90000" media="$RepresentationID$/$Time$.m4s" initialization="$RepresentationID$/init.mp4">
        <SegmentTimeline>
          <S t="100" d="10" r="2"/>
          <S d="20"/>
        </SegmentTimeline>
      </SegmentTemplate>
      <Representation id="v720" bandwidth="3000000" width="1280" height="720" codecs="avc1.64001f"/>
      <Representation bandwidth="800000"/>
    </AdaptationSet>
    <AdaptationSet mimeType="audio/mp4">
      <Representation id="a1" bandwidth="128000" codecs="mp4a.40.2"/>
    </AdaptationSet>
  </Period>
  <Period>
    <AdaptationSet/>
  </Period>
</MPD>"#;

    #[test]
    fn test_parse_live_manifest() {
        let mpd = parse(LIVE_MPD.as_bytes()).unwrap();

        assert_eq!(mpd.presentation_type.as_deref(), Some("dynamic"));
        assert_eq!(mpd.availability_start_time, Some(1_714_557_600));
        assert_eq!(mpd.publish_time, Some(1_714_566_600));
        assert_eq!(mpd.minimum_update_period, Some(Duration::from_secs(2)));
        assert_eq!(mpd.base_urls[0].url, "https://cdn.example.com/live/");
        assert_eq!(mpd.periods.len(), 2);

        let period = &mpd.periods[0];
        assert_eq!(period.id.as_deref(), Some("7"));
        assert_eq!(period.start, Some(Duration::from_secs(5400)));
        assert_eq!(period.base_urls.len(), 1);
        assert_eq!(period.adaptation_sets.len(), 2);

        let video = &period.adaptation_sets[0];
        assert_eq!(video.id.as_deref(), Some("v"));
        assert_eq!(video.mime_type.as_deref(), Some("video/mp4"));
        let template = video.segment_template.as_ref().unwrap();
        assert_eq!(template.media.as_deref(), Some("$RepresentationID$/$Time$.m4s"));
        assert_eq!(template.timescale, Some(90000));
        let entries = &template.segment_timeline.as_ref().unwrap().entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].t, Some(100));
        assert_eq!(entries[0].d, 10);
        assert_eq!(entries[0].r, Some(2));
        assert_eq!(entries[1].t, None);
        assert_eq!(entries[1].r, None);

        let rep = &video.representations[0];
        assert_eq!(rep.id.as_deref(), Some("v720"));
        assert_eq!(rep.bandwidth, Some(3_000_000));
        assert_eq!(rep.width, Some(1280));
        assert_eq!(rep.height, Some(720));
        assert_eq!(rep.codecs.as_deref(), Some("avc1.64001f"));

        let bare = &video.representations[1];
        assert!(bare.id.is_none());
        assert!(bare.width.is_none());
        assert!(bare.codecs.is_none());

        let untitled = &mpd.periods[1];
        assert!(untitled.id.is_none());
        assert!(untitled.start.is_none());
        assert_eq!(untitled.adaptation_sets.len(), 1);
        assert!(untitled.adaptation_sets[0].mime_type.is_none());
    }

    #[test]
    fn test_parse_strips_bom() {
        let doc = "\u{feff}<MPD><Period id=\"1\"/></MPD>";
        let mpd = parse(doc.as_bytes()).unwrap();
        assert_eq!(mpd.periods.len(), 1);
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(matches!(parse(b"   "), Err(ParseError::Empty)));
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        assert!(matches!(parse(&[0xff, 0xfe, 0x00]), Err(ParseError::Utf8(_))));
    }

    #[test]
    fn test_parse_interleaved_children() {
        let doc = r#"<MPD><Period id="1"><AdaptationSet id="a"/><BaseURL>x/</BaseURL><AdaptationSet id="b"/></Period></MPD>"#;
        let mpd = parse(doc.as_bytes()).unwrap();

        let period = &mpd.periods[0];
        let ids: Vec<_> = period
            .adaptation_sets
            .iter()
            .map(|set| set.id.as_deref())
            .collect();
        assert_eq!(ids, vec![Some("a"), Some("b")]);
        assert_eq!(period.base_url(), Some("x/"));
    }

    #[rstest]
    #[case::unclosed("<MPD><Period></MPD>")]
    #[case::bad_duration(r#"<MPD><Period id="1" start="soon"/></MPD>"#)]
    fn test_parse_rejects(#[case] doc: &str) {
        assert!(matches!(parse(doc.as_bytes()), Err(ParseError::Manifest(_))));
    }
}
