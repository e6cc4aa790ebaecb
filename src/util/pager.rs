use crate::{
    adapters::ObjectClient,
    model::fs::{FSError, FSListing},
    util::cancel::CancellationToken,
};

/// Lazily walks every page of a prefix listing.
///
/// Each `next` issues at most one list request, following the continuation
/// token of the previous page. Iteration ends after the last page or after the
/// first error; a pager cannot be restarted.
pub struct ListPager<'a> {
    client: &'a dyn ObjectClient,
    bucket: &'a str,
    prefix: &'a str,
    delimiter: Option<&'a str>,
    cancel: &'a CancellationToken,
    continuation_token: Option<String>,
    done: bool,
}

impl<'a> ListPager<'a> {
    pub fn new(
        client: &'a dyn ObjectClient,
        bucket: &'a str,
        prefix: &'a str,
        delimiter: Option<&'a str>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            bucket,
            prefix,
            delimiter,
            cancel,
            continuation_token: None,
            done: false,
        }
    }

    /// Flattens the pages into the keys of literal objects.
    pub fn keys(self) -> impl Iterator<Item = Result<String, FSError>> + 'a {
        self.flat_map(|page| -> Box<dyn Iterator<Item = Result<String, FSError>>> {
            match page {
                Ok(listing) => Box::new(listing.objects.into_iter().map(|object| Ok(object.key))),
                Err(err) => Box::new(std::iter::once(Err(err))),
            }
        })
    }
}

impl Iterator for ListPager<'_> {
    type Item = Result<FSListing, FSError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let page = self.client.fs_list_objects(
            self.bucket,
            self.prefix,
            self.delimiter,
            self.continuation_token.take(),
            self.cancel,
        );

        match page {
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
            Ok(listing) => {
                self.continuation_token = listing.next_token.clone();
                self.done = self.continuation_token.is_none();
                Some(Ok(listing))
            }
        }
    }
}
