//! Assignment of extracted URLs to site slots.

use std::collections::BTreeMap;

use url::Url;

/// URLs placed into site slots, plus whatever did not fit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// Site name to URL.
    pub sites: BTreeMap<String, Url>,
    /// URLs that matched no free slot, in order of appearance.
    pub overflow: Vec<Url>,
}

/// Places `urls` into the slots named by `sites`.
///
/// A URL whose host contains a site name goes to that site's slot; when
/// several site names match, the longest one wins. URLs naming no site then
/// fill the still-empty slots in `sites` order. Everything else, including a
/// second URL for an already filled site, ends up in the overflow.
pub fn assign_urls(urls: &[Url], sites: &[String]) -> Assignment {
    let mut slots: Vec<Option<usize>> = vec![None; sites.len()];
    let mut placed = vec![false; urls.len()];
    let mut anonymous = Vec::new();

    for (index, url) in urls.iter().enumerate() {
        match site_for(url, sites) {
            Some(slot) if slots[slot].is_none() => {
                slots[slot] = Some(index);
                placed[index] = true;
            }
            Some(_) => {}
            None => anonymous.push(index),
        }
    }

    let mut anonymous = anonymous.into_iter();
    for slot in slots.iter_mut().filter(|slot| slot.is_none()) {
        let Some(index) = anonymous.next() else {
            break;
        };
        *slot = Some(index);
        placed[index] = true;
    }

    let sites = sites
        .iter()
        .zip(&slots)
        .filter_map(|(site, slot)| slot.map(|index| (site.clone(), urls[index].clone())))
        .collect();
    let overflow = urls
        .iter()
        .zip(&placed)
        .filter(|(_, placed)| !**placed)
        .map(|(url, _)| url.clone())
        .collect();

    Assignment { sites, overflow }
}

fn site_for(url: &Url, sites: &[String]) -> Option<usize> {
    let host = url.host_str()?.to_ascii_lowercase();
    sites
        .iter()
        .enumerate()
        .filter(|(_, site)| !site.is_empty() && host.contains(&site.to_ascii_lowercase()))
        .max_by_key(|(index, site)| (site.len(), std::cmp::Reverse(*index)))
        .map(|(index, _)| index)
}
