//! Embedded tag extraction.
//!
//! Wraps symphonia probing into the one question the indexer and the art
//! handler ask: what are this file's text tags, and does it embed a cover?

use std::fs::File;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{
    MetadataOptions, MetadataRevision, StandardTagKey, StandardVisualKey,
};
use symphonia::core::probe::Hint;

const MAX_COVER_ART_BYTES: usize = 5_000_000;

/// Embedded cover image bytes with their reported MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Tag fields read from one audio file.
///
/// A field is the empty string when the tag container is present but carries
/// no value for it.
#[derive(Clone, Debug, Default)]
pub struct SongTags {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub cover: Option<CoverImage>,
}

/// Read tags from an open file handle positioned at the start.
///
/// Returns `None` when the file has no recognizable tag container. That is
/// the caller's cue to skip the file, not an error.
pub fn read_tags(file: File, ext_hint: Option<&str>) -> Option<SongTags> {
    let mut hint = Hint::new();
    if let Some(ext) = ext_hint {
        if !ext.is_empty() {
            hint.with_extension(ext);
        }
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut probed = match symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(_) => return None,
    };

    // ID3v2 ends up in the probe-level metadata, vorbis comments and iTunes
    // atoms in the container metadata.
    let revision = {
        let container = probed.format.metadata().current().cloned();
        container.or_else(|| {
            probed
                .metadata
                .get()
                .as_ref()
                .and_then(|log| log.current())
                .cloned()
        })
    }?;

    Some(tags_from_revision(&revision))
}

fn tags_from_revision(rev: &MetadataRevision) -> SongTags {
    let mut tags = SongTags::default();
    for tag in rev.tags() {
        match tag.std_key {
            Some(StandardTagKey::Artist) => {
                if tags.artist.is_empty() {
                    tags.artist = tag.value.to_string();
                }
            }
            Some(StandardTagKey::Album) => {
                if tags.album.is_empty() {
                    tags.album = tag.value.to_string();
                }
            }
            Some(StandardTagKey::TrackTitle) => {
                if tags.title.is_empty() {
                    tags.title = tag.value.to_string();
                }
            }
            _ => {}
        }
    }
    tags.cover = select_cover(rev);
    tags
}

fn select_cover(rev: &MetadataRevision) -> Option<CoverImage> {
    let mut best = rev
        .visuals()
        .iter()
        .find(|visual| visual.usage == Some(StandardVisualKey::FrontCover));
    if best.is_none() {
        best = rev.visuals().first();
    }
    let visual = best?;
    if visual.data.len() > MAX_COVER_ART_BYTES {
        return None;
    }
    Some(CoverImage {
        mime_type: visual.media_type.clone(),
        data: visual.data.to_vec(),
    })
}
