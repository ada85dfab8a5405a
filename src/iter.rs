//! Iterators over the reading order and the table of contents

use std::{iter::FusedIterator, slice};

use indexmap::IndexMap;

use crate::{
    error::EpubError,
    types::{ManifestItem, NavPoint, SpineItem},
};

/// Iterates the spine in reading order
///
/// Each step yields the manifest id and the root-relative href of the spine
/// item. A spine item whose id the manifest does not declare yields
/// [EpubError::DanglingSpineReference]; iteration continues with the next item.
pub struct SpineIter<'a> {
    spine: slice::Iter<'a, SpineItem>,
    manifest: &'a IndexMap<String, ManifestItem>,
}

impl<'a> SpineIter<'a> {
    pub(crate) fn new(
        spine: &'a [SpineItem],
        manifest: &'a IndexMap<String, ManifestItem>,
    ) -> Self {
        Self {
            spine: spine.iter(),
            manifest,
        }
    }
}

impl<'a> Iterator for SpineIter<'a> {
    type Item = Result<(&'a str, &'a str), EpubError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.spine.next()?;

        Some(match self.manifest.get(&item.idref) {
            Some(resource) => Ok((item.idref.as_str(), resource.href.as_str())),
            None => Err(EpubError::DanglingSpineReference {
                idref: item.idref.clone(),
            }),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.spine.size_hint()
    }
}

impl ExactSizeIterator for SpineIter<'_> {}

impl FusedIterator for SpineIter<'_> {}

/// Walks a navigation tree in pre-order
///
/// A parent is yielded before its children and siblings keep document order.
/// Every node carries its own `level`, so no depth bookkeeping is needed here.
pub struct NavigationIter<'a> {
    stack: Vec<&'a NavPoint>,
}

impl<'a> NavigationIter<'a> {
    pub(crate) fn new(points: &'a [NavPoint]) -> Self {
        Self {
            stack: points.iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for NavigationIter<'a> {
    type Item = &'a NavPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let point = self.stack.pop()?;
        self.stack.extend(point.children.iter().rev());
        Some(point)
    }
}

impl FusedIterator for NavigationIter<'_> {}
